/// Router Module Index
///
/// Routes are split by the access they require. The gate for each group is
/// applied once, as a layer, in `create_router`, so no handler can be reached
/// without the check its group demands.

/// Routes open to anonymous callers: kanban, wiki, uploads and sign-in.
pub mod public;

/// Routes behind `require_role::<AnyUser>`.
pub mod authenticated;

/// Routes behind `require_role::<AdminOnly>`.
pub mod admin;
