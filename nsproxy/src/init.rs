//! The initial bundle

use crate::bundle::NsBundle;
use identity::init_user_ns;
use std::sync::{Arc, OnceLock};

static INIT_NSPROXY: OnceLock<Arc<NsBundle>> = OnceLock::new();

/// The boot-time bundle, owned by the initial user namespace
///
/// Created on first use. The static keeps one reference forever, so the
/// initial bundle is never freed.
pub fn init_nsproxy() -> &'static Arc<NsBundle> {
    INIT_NSPROXY.get_or_init(|| NsBundle::initial(init_user_ns()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::NamespaceKind;

    #[test]
    fn test_init_nsproxy_is_singleton() {
        let a = init_nsproxy();
        let b = init_nsproxy();
        assert!(Arc::ptr_eq(a, b));
        assert!(NsBundle::refcount(a) >= 1);
    }

    #[test]
    fn test_init_nsproxy_owned_by_init_user_ns() {
        let bundle = init_nsproxy();
        for kind in NamespaceKind::ALL {
            assert!(Arc::ptr_eq(bundle.member(kind).owner(), init_user_ns()));
        }
    }
}
