//! term_colors is a collection of convenience functions for coloring the provisioner's
//! progress output.
//!
//! Every painter accepts anything [Display](std::fmt::Display)able so that call sites can
//! hand over URLs, ids, durations and status codes without formatting them first.

use ansi_term::{Color, Style};
use std::fmt::Display;

macro_rules! painter {
    ($(#[$doc:meta])* $name:ident => $style:expr) => {
        $(#[$doc])*
        pub fn $name<T: Display>(input: T) -> String {
            $style.paint(input.to_string()).to_string()
        }
    };
}

painter!(
    /// Headings and banners.
    bold => Style::new().bold()
);
painter!(
    /// URLs, process group ids and file paths.
    cyan => Color::Cyan.normal()
);
painter!(red => Color::Red.normal());
painter!(green => Color::Green.normal());
painter!(yellow => Color::Yellow.normal());

/// The marker prefixed to a step that has completed.
pub fn ok() -> String {
    green("[ OK ]")
}

/// The marker prefixed to a step that has failed.
pub fn failed() -> String {
    red("[FAIL]")
}

/// The marker prefixed to a step that is still waiting on the server.
pub fn waiting() -> String {
    yellow("[WAIT]")
}
