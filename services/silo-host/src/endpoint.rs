//! Endpoint binding and container detection

use serde::Serialize;
use silo_config::defaults;
use silo_config::env::EnvSource;
use silo_config::SiloConfig;
use std::net::IpAddr;
use tracing::{info, warn};

/// How the silo advertises and binds its silo and gateway ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EndpointBinding {
    /// Resolve the advertised address from the machine's host name
    DnsHostName {
        host_name: String,
        silo_port: u16,
        gateway_port: u16,
    },
    /// Let the runtime pick the advertised address
    Unspecified {
        silo_port: u16,
        gateway_port: u16,
        listen_on_any_host_address: bool,
    },
    Explicit {
        advertised_ip: IpAddr,
        silo_port: u16,
        gateway_port: u16,
        listen_on_any_host_address: bool,
    },
}

impl EndpointBinding {
    pub fn silo_port(&self) -> u16 {
        match self {
            EndpointBinding::DnsHostName { silo_port, .. }
            | EndpointBinding::Unspecified { silo_port, .. }
            | EndpointBinding::Explicit { silo_port, .. } => *silo_port,
        }
    }

    pub fn gateway_port(&self) -> u16 {
        match self {
            EndpointBinding::DnsHostName { gateway_port, .. }
            | EndpointBinding::Unspecified { gateway_port, .. }
            | EndpointBinding::Explicit { gateway_port, .. } => *gateway_port,
        }
    }
}

/// `DOTNET_RUNNING_IN_CONTAINER` or `SILO_RUNNING_IN_CONTAINER` set to `true`
pub fn is_running_in_container(env: &dyn EnvSource) -> bool {
    [defaults::env::RUNNING_IN_CONTAINER, defaults::env::SILO_RUNNING_IN_CONTAINER]
        .iter()
        .filter_map(|key| env.var(key))
        .any(|flag| flag.trim().eq_ignore_ascii_case("true"))
}

/// Host name from `HOSTNAME`, then `/etc/hostname`, then `localhost`
pub fn host_name(env: &dyn EnvSource) -> String {
    if let Some(name) = env.non_empty_var(defaults::env::HOSTNAME) {
        return name.trim().to_string();
    }

    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Pick the endpoint binding; an unparseable advertised IP degrades to
/// host-name binding instead of failing
pub fn endpoint_binding(silo: &SiloConfig, env: &dyn EnvSource) -> EndpointBinding {
    let dns_binding = || EndpointBinding::DnsHostName {
        host_name: host_name(env),
        silo_port: silo.silo_port,
        gateway_port: silo.gateway_port,
    };

    if is_running_in_container(env) {
        info!("Container detected, binding endpoints by host name");
        return dns_binding();
    }

    let Some(literal) = silo.advertised_ip_literal() else {
        return EndpointBinding::Unspecified {
            silo_port: silo.silo_port,
            gateway_port: silo.gateway_port,
            listen_on_any_host_address: silo.listen_on_any_host_address,
        };
    };

    match literal.parse::<IpAddr>() {
        Ok(advertised_ip) => EndpointBinding::Explicit {
            advertised_ip,
            silo_port: silo.silo_port,
            gateway_port: silo.gateway_port,
            listen_on_any_host_address: silo.listen_on_any_host_address,
        },
        Err(e) => {
            warn!(
                "AdvertisedIp '{}' is not an IP address ({}), binding endpoints by host name",
                literal, e
            );
            dns_binding()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_config::MapEnv;
    use std::net::Ipv4Addr;

    fn silo(advertised_ip: Option<&str>) -> SiloConfig {
        SiloConfig {
            cluster_id: "c1".to_string(),
            service_id: "s1".to_string(),
            advertised_ip: advertised_ip.map(str::to_string),
            listen_on_any_host_address: true,
            ..SiloConfig::default()
        }
    }

    #[test]
    fn test_container_detection_is_case_insensitive() {
        assert!(!is_running_in_container(&MapEnv::new()));
        assert!(is_running_in_container(
            &MapEnv::new().with_var("DOTNET_RUNNING_IN_CONTAINER", "TRUE")
        ));
        assert!(is_running_in_container(
            &MapEnv::new().with_var("SILO_RUNNING_IN_CONTAINER", "true")
        ));
        assert!(!is_running_in_container(
            &MapEnv::new().with_var("DOTNET_RUNNING_IN_CONTAINER", "1")
        ));
    }

    #[test]
    fn test_container_binds_by_host_name() {
        let env = MapEnv::new()
            .with_var("DOTNET_RUNNING_IN_CONTAINER", "true")
            .with_var("HOSTNAME", "silo-7f9c");

        assert_eq!(
            endpoint_binding(&silo(Some("10.0.0.5")), &env),
            EndpointBinding::DnsHostName {
                host_name: "silo-7f9c".to_string(),
                silo_port: 11111,
                gateway_port: 30000,
            }
        );
    }

    #[test]
    fn test_unspecified_ip_forms() {
        for advertised in [None, Some(""), Some("*"), Some("  ")] {
            assert_eq!(
                endpoint_binding(&silo(advertised), &MapEnv::new()),
                EndpointBinding::Unspecified {
                    silo_port: 11111,
                    gateway_port: 30000,
                    listen_on_any_host_address: true,
                }
            );
        }
    }

    #[test]
    fn test_explicit_ip() {
        let binding = endpoint_binding(&silo(Some("192.168.1.20")), &MapEnv::new());
        assert_eq!(
            binding,
            EndpointBinding::Explicit {
                advertised_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
                silo_port: 11111,
                gateway_port: 30000,
                listen_on_any_host_address: true,
            }
        );
        assert_eq!(binding.silo_port(), 11111);
        assert_eq!(binding.gateway_port(), 30000);
    }

    #[test]
    fn test_bad_ip_falls_back_to_host_name() {
        let env = MapEnv::new().with_var("HOSTNAME", "node-a");
        assert_eq!(
            endpoint_binding(&silo(Some("not-an-ip")), &env),
            EndpointBinding::DnsHostName {
                host_name: "node-a".to_string(),
                silo_port: 11111,
                gateway_port: 30000,
            }
        );
    }
}
