//! Hostname parsing against the cluster DNS suffix

/// Default cluster DNS suffix for services
pub const DEFAULT_CLUSTER_DOMAIN_SUFFIX: &str = "svc.cluster.local";

/// Classification of a hostname as written in a config object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedHost {
    /// `name`, `name.ns.svc` or `name.ns.svc.<suffix>`
    Service { namespace: String, name: String },
    /// `name.ns`; only a service when `ns` is a namespace
    ShortService { namespace: String, name: String },
    /// Starts with `*`
    Wildcard(String),
    External(String),
}

/// Parse `host` as seen from an object in `default_namespace`
pub fn parse_host(host: &str, default_namespace: &str, suffix: &str) -> ParsedHost {
    let host = host.trim().to_lowercase();
    if host.starts_with('*') {
        return ParsedHost::Wildcard(host);
    }

    let labels: Vec<&str> = host.split('.').collect();
    let svc_label = suffix.split('.').next().unwrap_or("svc");
    let service = |namespace: &str, name: &str| ParsedHost::Service {
        namespace: namespace.to_string(),
        name: name.to_string(),
    };

    match labels.as_slice() {
        [name] => service(default_namespace, *name),
        [name, namespace] => ParsedHost::ShortService {
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        [name, namespace, svc] if *svc == svc_label => service(*namespace, *name),
        [name, namespace, rest @ ..] if rest.join(".") == suffix => service(*namespace, *name),
        _ => ParsedHost::External(host.clone()),
    }
}

/// Fully qualified service hostname
pub fn fqdn(namespace: &str, name: &str, suffix: &str) -> String {
    format!("{}.{}.{}", name, namespace, suffix)
}

/// Whether `pattern` (possibly `*` or `*.domain`) covers `host`
pub fn host_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let host = host.to_lowercase();
    if pattern == "*" || pattern == host {
        return true;
    }
    match pattern.strip_prefix('*') {
        Some(domain) => match host.strip_prefix('*') {
            Some(host_domain) => host_domain.ends_with(domain),
            None => host.ends_with(domain) && host.len() > domain.len(),
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc(namespace: &str, name: &str) -> ParsedHost {
        ParsedHost::Service {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    #[test]
    fn test_parse_service_forms() {
        let suffix = DEFAULT_CLUSTER_DOMAIN_SUFFIX;
        assert_eq!(parse_host("reviews", "bookinfo", suffix), svc("bookinfo", "reviews"));
        assert_eq!(parse_host("reviews.other.svc", "bookinfo", suffix), svc("other", "reviews"));
        assert_eq!(
            parse_host("reviews.other.svc.cluster.local", "bookinfo", suffix),
            svc("other", "reviews")
        );
        assert_eq!(
            parse_host("reviews.other", "bookinfo", suffix),
            ParsedHost::ShortService {
                namespace: "other".into(),
                name: "reviews".into()
            }
        );
    }

    #[test]
    fn test_parse_respects_custom_suffix() {
        assert_eq!(
            parse_host("reviews.other.svc.corp.internal", "bookinfo", "svc.corp.internal"),
            svc("other", "reviews")
        );
        assert_eq!(
            parse_host("reviews.other.svc.cluster.local", "bookinfo", "svc.corp.internal"),
            ParsedHost::External("reviews.other.svc.cluster.local".into())
        );
    }

    #[test]
    fn test_parse_external_and_wildcard() {
        let suffix = DEFAULT_CLUSTER_DOMAIN_SUFFIX;
        assert_eq!(
            parse_host("api.example.com", "bookinfo", suffix),
            ParsedHost::External("api.example.com".into())
        );
        assert_eq!(
            parse_host("*.example.com", "bookinfo", suffix),
            ParsedHost::Wildcard("*.example.com".into())
        );
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("*", "anything.com"));
        assert!(host_matches("*.example.com", "api.example.com"));
        assert!(host_matches("*.example.com", "a.b.example.com"));
        assert!(!host_matches("*.example.com", "example.com"));
        assert!(host_matches("*.com", "*.example.com"));
        assert!(host_matches("API.example.com", "api.example.com"));
        assert!(!host_matches("api.example.com", "web.example.com"));
    }
}
