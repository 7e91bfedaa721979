//! Authorization request options.

use bitflags::bitflags;

bitflags! {
    /// Option bits passed along with an authorization request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AuthorizeOptions: u32 {
        /// Fail rather than return a cached success.
        const FORCE = 1 << 0;
        /// The policy service may interact with the user.
        const INTERACT = 1 << 1;
    }
}
