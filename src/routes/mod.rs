/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// enforcing a Defense-in-Depth strategy. This structure ensures that
/// access control is applied explicitly at the module level (via Axum layers),
/// preventing accidental exposure of protected endpoints.
///
/// The first three modules map directly to the defined access roles; the pages
/// module serves the browser-facing portal bundle behind the route gate.

/// Routes accessible to all clients (health, login, registration).
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a validated session.
pub mod authenticated;

/// Routes restricted exclusively to accounts with the ADMIN role.
/// Implements mandatory authorization checks.
pub mod admin;

/// Browser-facing page routes, wrapped by the route gate middleware.
pub mod pages;
