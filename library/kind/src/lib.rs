pub use kind_derive::*;

/// A type that implements Kind is capable of naming itself to an operator reading the logs.
/// Every pipeline error implements it so that a failure report can say *which* failure
/// occurred (`ImportError::Rejected`) separately from the human readable message.
///
/// This is most easily accomplished by using the Kind derive macro.
///
/// ```
/// use kind::Kind;
///
/// #[derive(Kind)]
/// struct Timeout {}
///
/// #[derive(Kind)]
/// enum LoadError {
///     NotFound,
///     Parse(String),
/// }
///
/// assert_eq!("Timeout", Timeout {}.kind());
/// assert_eq!("LoadError::NotFound", LoadError::NotFound.kind());
/// assert_eq!("LoadError::Parse", LoadError::Parse("eof".into()).kind());
/// ```
///
/// The derive macro refuses unions. Implement Kind by hand for those.
pub trait Kind {
    fn kind(&self) -> &'static str;
}

impl<T: Kind + ?Sized> Kind for Box<T> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }
}
