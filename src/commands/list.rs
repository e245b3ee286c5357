//! List commands implementation

use crate::backends;

/// List all backends compiled into this binary
pub fn list_backends() {
    print!("{}", backends::backend_help());
}
