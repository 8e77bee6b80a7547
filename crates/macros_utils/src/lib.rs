//! Small declarative helpers shared by the homewatch binaries.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web;

/// Generate a `routes` function registering every listed handler.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     route list_services,
/// }
/// ```
///
/// expands to `pub fn routes(cfg: &mut actix_web::web::ServiceConfig)` which calls
/// `cfg.service(..)` for each handler in order, so it can be passed to
/// `App::configure` or `Scope::configure`.
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($(route $handler:ident),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::actix_web::web::ServiceConfig) {
            $(cfg.service($handler);)*
        }
    };
}
