// ============================================================================
// MODELS
// ============================================================================
//
//   - users         : user records (sea-orm entity) and the closed Role enum
//   - dto           : request bodies, sanitized projections, response envelope
//   - health        : liveness check payload
//   - notifications : in-app notices per user
//
// ============================================================================

pub mod dto;
pub mod health;
pub mod notifications;
pub mod users;
