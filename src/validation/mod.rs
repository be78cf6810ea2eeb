/*!
 * Validation of translated batches.
 *
 * # Architecture
 *
 * - `length`: Checks translated lines against display limits
 * - `service`: Validates a whole batch
 */

pub mod length;
pub mod service;

// Re-export main types
pub use length::{LengthIssue, LengthValidator};
pub use service::BatchValidator;
