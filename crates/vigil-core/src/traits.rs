use serde_json::Value;

use crate::error::VigilResult;
use crate::types::{RequestTypeId, Session};

// ---------------------------------------------------------------------------
// ApiRequest: an authenticated API invocation
//
// Request types carry their metadata explicitly: the operation identifier
// and whether the type is exempt from authorization altogether.
// ---------------------------------------------------------------------------

pub trait ApiRequest {
    fn request_type(&self) -> &RequestTypeId;

    /// Exempt request types are allowed without consulting any policy.
    fn is_exempt(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// FieldResolver: per-field access for field-scoped denial
// ---------------------------------------------------------------------------

/// Resolves the submitted value of a named request field.
///
/// `Ok(None)` means the field exists on the request type but was not set.
/// A field the request type does not declare is an error, never `None`.
pub trait FieldResolver<R: ?Sized>: Send + Sync {
    fn value_of(
        &self,
        request_type: &RequestTypeId,
        field: &str,
        request: &R,
    ) -> VigilResult<Option<Value>>;
}

// ---------------------------------------------------------------------------
// PermissionHook: fine-grained per-operation check on the allow path
// ---------------------------------------------------------------------------

pub trait PermissionHook<R: ?Sized>: Send + Sync {
    fn check_permission(&self, request: &R, session: &Session) -> bool;
}

impl<R: ?Sized, F> PermissionHook<R> for F
where
    F: Fn(&R, &Session) -> bool + Send + Sync,
{
    fn check_permission(&self, request: &R, session: &Session) -> bool {
        self(request, session)
    }
}

/// Hook that never vetoes an allow statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllHook;

impl<R: ?Sized> PermissionHook<R> for AllowAllHook {
    fn check_permission(&self, _request: &R, _session: &Session) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping {
        request_type: RequestTypeId,
    }

    impl ApiRequest for Ping {
        fn request_type(&self) -> &RequestTypeId {
            &self.request_type
        }
    }

    // Verify the trait objects are object-safe
    fn _assert_resolver_object_safe(_: &dyn FieldResolver<Ping>) {}
    fn _assert_hook_object_safe(_: &dyn PermissionHook<Ping>) {}

    #[test]
    fn test_api_request_not_exempt_by_default() {
        let ping = Ping {
            request_type: RequestTypeId::new("PingMsg"),
        };
        assert!(!ping.is_exempt());
        assert_eq!(ping.request_type().as_str(), "PingMsg");
    }

    #[test]
    fn test_allow_all_hook() {
        let ping = Ping {
            request_type: RequestTypeId::new("PingMsg"),
        };
        assert!(AllowAllHook.check_permission(&ping, &Session::account("a")));
    }

    #[test]
    fn test_closure_hook() {
        let ping = Ping {
            request_type: RequestTypeId::new("PingMsg"),
        };
        let only_users = |_: &Ping, session: &Session| session.is_user_session();
        assert!(!only_users.check_permission(&ping, &Session::account("a")));
        assert!(only_users.check_permission(&ping, &Session::user("a", "u")));
    }
}
