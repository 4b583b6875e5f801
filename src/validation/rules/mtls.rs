use crate::models::{Check, ConfigKind, ConfigRef, RefKey, ValidationEntry};
use crate::validation::{Rule, RuleContext};

/// KIA0501: STRICT peer authentication contradicted by a destination rule disabling TLS
pub struct StrictMtlsConflict;

impl Rule for StrictMtlsConflict {
    fn code(&self) -> &'static str {
        "KIA0501"
    }

    fn description(&self) -> &'static str {
        "STRICT mTLS must not be disabled by a destination rule"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[ConfigKind::PeerAuthentication]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ConfigRef::PeerAuthentication(pa) = obj else {
            return;
        };
        let strict = pa
            .spec
            .mtls
            .as_ref()
            .and_then(|mtls| mtls.mode.as_deref())
            .is_some_and(|mode| mode.eq_ignore_ascii_case("STRICT"));
        if !strict {
            return;
        }

        let disabling: Vec<RefKey> = ctx
            .state
            .list(obj.namespace())
            .map(|list| list.objects_of(ConfigKind::DestinationRule))
            .unwrap_or_default()
            .into_iter()
            .filter(|dr| match dr {
                ConfigRef::DestinationRule(dr) => dr
                    .spec
                    .tls_modes()
                    .iter()
                    .any(|mode| mode.eq_ignore_ascii_case("DISABLE")),
                _ => false,
            })
            .map(|dr| dr.key().into())
            .collect();

        if !disabling.is_empty() {
            entry.fail(
                Check::error(
                    self.code(),
                    "mTLS is STRICT but a DestinationRule in this namespace disables TLS",
                    "spec/mtls/mode",
                ),
                disabling,
            );
        }
    }
}
