/// Router Module Index
///
/// Splits the BFF surface by who may call it. Access control for the admin module is
/// enforced per handler through the `AdminSession` extractor.

/// Read-only listing and detail routes, open to anonymous callers.
pub mod public;

/// Routes scoped to the caller's own profile and role.
pub mod caller;

/// Mutation-capable routes behind the admin gate.
pub mod admin;
