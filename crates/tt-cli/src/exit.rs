//! Process exit codes.

use tt_core::{SessionError, StartError, ValidationError};
use tt_db::DbError;

pub const SUCCESS: u8 = 0;
pub const FAILURE: u8 = 1;
pub const INVALID_INPUT: u8 = 2;
pub const STATE_CONFLICT: u8 = 3;
pub const STORE_BUSY: u8 = 4;
/// Status reported when `run` cannot find the command.
pub const COMMAND_NOT_FOUND: u8 = 127;

/// Maps an error to the exit code for its root cause.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(err) = cause.downcast_ref::<DbError>() {
            if err.is_busy() {
                return STORE_BUSY;
            }
            match err {
                DbError::Validation(_) => return INVALID_INPUT,
                DbError::Session(_) => return STATE_CONFLICT,
                _ => {}
            }
        }
        if cause.is::<ValidationError>() {
            return INVALID_INPUT;
        }
        if cause.is::<SessionError>() {
            return STATE_CONFLICT;
        }
        if let Some(err) = cause.downcast_ref::<StartError>() {
            return match err {
                StartError::Validation(_) => INVALID_INPUT,
                StartError::Session(_) => STATE_CONFLICT,
            };
        }
    }
    FAILURE
}
