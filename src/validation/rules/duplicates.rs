use std::collections::BTreeSet;

use crate::models::{Check, ConfigKind, ConfigRef, RefKey, ValidationEntry};
use crate::references::extract::split_gateway;
use crate::references::hosts::host_matches;
use crate::validation::{Rule, RuleContext};

/// Objects of `kind` anywhere in the collected state, excluding `obj`
fn others<'a>(ctx: &RuleContext<'a>, obj: ConfigRef<'_>) -> Vec<ConfigRef<'a>> {
    let me = obj.key();
    ctx.state
        .objects_of(obj.kind())
        .into_iter()
        .filter(|other| other.key() != me)
        .collect()
}

/// KIA0201: one destination rule per host and subset combination
pub struct DuplicateDestinationRule;

impl Rule for DuplicateDestinationRule {
    fn code(&self) -> &'static str {
        "KIA0201"
    }

    fn description(&self) -> &'static str {
        "No two destination rules for the same host and subsets"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[ConfigKind::DestinationRule]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ConfigRef::DestinationRule(dr) = obj else {
            return;
        };
        let host = ctx.resolver.canonical(&dr.spec.host, obj.namespace());
        let subsets: BTreeSet<&str> = dr.spec.subsets.iter().map(|s| s.name.as_str()).collect();

        let duplicates: Vec<RefKey> = others(ctx, obj)
            .into_iter()
            .filter(|other| match other {
                ConfigRef::DestinationRule(o) => {
                    if ctx.resolver.canonical(&o.spec.host, other.namespace()) != host {
                        return false;
                    }
                    let theirs: BTreeSet<&str> =
                        o.spec.subsets.iter().map(|s| s.name.as_str()).collect();
                    (subsets.is_empty() && theirs.is_empty()) || !subsets.is_disjoint(&theirs)
                }
                _ => false,
            })
            .map(|other| other.key().into())
            .collect();

        if !duplicates.is_empty() {
            entry.fail(
                Check::warning(
                    self.code(),
                    "More than one DestinationRules for the same host subset combination",
                    "spec/host",
                ),
                duplicates,
            );
        }
    }
}

/// Gateway hosts may be written as `ns/host`
fn gateway_host(host: &str) -> &str {
    host.split_once('/').map_or(host, |(_, h)| h)
}

fn hosts_overlap(a: &str, b: &str) -> bool {
    host_matches(a, b) || host_matches(b, a)
}

/// KIA0301: gateways on the same workloads must not expose the same host and port twice
pub struct DuplicateGatewayHost;

impl Rule for DuplicateGatewayHost {
    fn code(&self) -> &'static str {
        "KIA0301"
    }

    fn description(&self) -> &'static str {
        "No two gateways with the same selector expose the same host and port"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[ConfigKind::Gateway]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ConfigRef::Gateway(gw) = obj else {
            return;
        };
        let peers: Vec<_> = others(ctx, obj)
            .into_iter()
            .filter_map(|other| match other {
                ConfigRef::Gateway(o) if o.spec.selector == gw.spec.selector => Some((other, o)),
                _ => None,
            })
            .collect();
        if peers.is_empty() {
            return;
        }

        for (i, server) in gw.spec.servers.iter().enumerate() {
            let Some(port) = server.port.as_ref().map(|p| p.number) else {
                continue;
            };
            for (j, host) in server.hosts.iter().enumerate() {
                let host = gateway_host(host);
                let clashing: Vec<RefKey> = peers
                    .iter()
                    .filter(|(_, o)| {
                        o.spec.servers.iter().any(|s| {
                            s.port.as_ref().is_some_and(|p| p.number == port)
                                && s.hosts.iter().any(|h| hosts_overlap(gateway_host(h), host))
                        })
                    })
                    .map(|(other, _)| other.key().into())
                    .collect();
                if !clashing.is_empty() {
                    entry.fail(
                        Check::warning(
                            self.code(),
                            "More than one Gateway for the same host port combination",
                            format!("spec/servers[{}]/hosts[{}]", i, j),
                        ),
                        clashing,
                    );
                }
            }
        }
    }
}

/// KIA1106: one virtual service per host and gateway set
pub struct DuplicateVirtualService;

impl DuplicateVirtualService {
    fn gateways(spec: &crate::models::istio::VirtualServiceSpec, ns: &str) -> BTreeSet<String> {
        if spec.gateways.is_empty() {
            return BTreeSet::from(["mesh".to_string()]);
        }
        spec.gateways
            .iter()
            .map(|gw| match gw.as_str() {
                "mesh" => "mesh".to_string(),
                other => {
                    let (gw_ns, name) = split_gateway(other, ns);
                    format!("{}/{}", gw_ns, name)
                }
            })
            .collect()
    }
}

impl Rule for DuplicateVirtualService {
    fn code(&self) -> &'static str {
        "KIA1106"
    }

    fn description(&self) -> &'static str {
        "No two virtual services for the same host and gateways"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[ConfigKind::VirtualService]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ConfigRef::VirtualService(vs) = obj else {
            return;
        };
        let ns = obj.namespace();
        let hosts: BTreeSet<String> = vs
            .spec
            .hosts
            .iter()
            .map(|h| ctx.resolver.canonical(h, ns))
            .collect();
        let gateways = Self::gateways(&vs.spec, ns);

        let duplicates: Vec<RefKey> = others(ctx, obj)
            .into_iter()
            .filter(|other| match other {
                ConfigRef::VirtualService(o) => {
                    let other_ns = other.namespace();
                    Self::gateways(&o.spec, other_ns) == gateways
                        && o.spec
                            .hosts
                            .iter()
                            .any(|h| hosts.contains(&ctx.resolver.canonical(h, other_ns)))
                }
                _ => false,
            })
            .map(|other| other.key().into())
            .collect();

        if !duplicates.is_empty() {
            entry.fail(
                Check::warning(self.code(), "More than one Virtual Service for same host", "spec/hosts"),
                duplicates,
            );
        }
    }
}

/// KIA1501: K8s gateways must not share a listener hostname and port
pub struct DuplicateK8sGatewayListener;

impl Rule for DuplicateK8sGatewayListener {
    fn code(&self) -> &'static str {
        "KIA1501"
    }

    fn description(&self) -> &'static str {
        "No two K8s gateways expose the same listener hostname and port"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[ConfigKind::K8sGateway]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ConfigRef::K8sGateway(gw) = obj else {
            return;
        };
        let peers = others(ctx, obj);

        for (i, listener) in gw.spec.listeners.iter().enumerate() {
            // Listeners without a hostname accept any host and never collide by name
            let Some(hostname) = listener.hostname.as_deref() else {
                continue;
            };
            let clashing: Vec<RefKey> = peers
                .iter()
                .filter(|other| match other {
                    ConfigRef::K8sGateway(o) => o.spec.listeners.iter().any(|l| {
                        l.port == listener.port && l.hostname.as_deref() == Some(hostname)
                    }),
                    _ => false,
                })
                .map(|other| other.key().into())
                .collect();
            if !clashing.is_empty() {
                entry.fail(
                    Check::warning(
                        self.code(),
                        "More than one K8s Gateway for the same host port combination",
                        format!("spec/listeners[{}]/hostname", i),
                    ),
                    clashing,
                );
            }
        }
    }
}

/// KIA1502: listener names are unique within a gateway
pub struct DuplicateListenerName;

impl Rule for DuplicateListenerName {
    fn code(&self) -> &'static str {
        "KIA1502"
    }

    fn description(&self) -> &'static str {
        "K8s gateway listener names must be unique"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[ConfigKind::K8sGateway]
    }

    fn check(&self, _ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ConfigRef::K8sGateway(gw) = obj else {
            return;
        };
        let mut seen = BTreeSet::new();
        for (i, listener) in gw.spec.listeners.iter().enumerate() {
            if !seen.insert(listener.name.as_str()) {
                entry.fail(
                    Check::error(
                        self.code(),
                        format!("K8s Gateway listener name {} is not unique", listener.name),
                        format!("spec/listeners[{}]/name", i),
                    ),
                    Vec::new(),
                );
            }
        }
    }
}
