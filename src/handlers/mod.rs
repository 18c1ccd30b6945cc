// handlers/mod.rs - Handler tiers
//
// Public (no auth) → Protected (bearer JWT, principal in request extensions)
//
pub mod form;
pub mod protected;
pub mod public;
