mod definition;
mod endpoint;
mod env;
mod import;
mod pipeline;
mod readiness;
mod root_group;

#[macro_use]
extern crate log;

/// Provisions the configured flow definition into NiFi as soon as NiFi comes up, then exits.
///
/// Configuration is read exactly once from the environment (see [env::Config]). The process
/// exits with `0` once NiFi has accepted the flow and with `1` if any step failed or the
/// configuration itself is invalid.
#[tokio::main]
async fn main() {
    std::env::set_var("RUST_LOG_STYLE", "always");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = match env::Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{} Invalid configuration: {}", term_colors::failed(), err);
            std::process::exit(pipeline::FAILURE);
        }
    };
    std::process::exit(pipeline::run(&config).await);
}
