// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::config::{DEFAULT_HEARTBEAT_PERIOD, DEFAULT_NACK_RESPONSE_DELAY};

/// Transport family of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    RtpsUdp,
    Tcp,
    Udp,
    Multicast,
    Shmem,
}

impl TransportKind {
    pub fn name(self) -> &'static str {
        match self {
            TransportKind::RtpsUdp => "rtps_udp",
            TransportKind::Tcp => "tcp",
            TransportKind::Udp => "udp",
            TransportKind::Multicast => "multicast",
            TransportKind::Shmem => "shmem",
        }
    }

    /// Parse a transport kind name as used in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rtps_udp" => Some(TransportKind::RtpsUdp),
            "tcp" => Some(TransportKind::Tcp),
            "udp" => Some(TransportKind::Udp),
            "multicast" => Some(TransportKind::Multicast),
            "shmem" => Some(TransportKind::Shmem),
            _ => None,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const DEFAULT_SEND_BUFFER: usize = 64 * 1024;
const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpsUdpOptions {
    pub local_address: Option<IpAddr>,
    pub use_multicast: bool,
    pub multicast_group_address: IpAddr,
    pub ttl: u8,
    pub send_buffer_size: usize,
    pub heartbeat_period: Duration,
    pub nak_response_delay: Duration,
}

impl Default for RtpsUdpOptions {
    fn default() -> Self {
        Self {
            local_address: None,
            use_multicast: true,
            multicast_group_address: IpAddr::V4(DEFAULT_MULTICAST_GROUP),
            ttl: 1,
            send_buffer_size: DEFAULT_SEND_BUFFER,
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
            nak_response_delay: DEFAULT_NACK_RESPONSE_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpOptions {
    pub local_address: Option<IpAddr>,
    pub pub_address: Option<IpAddr>,
    pub enable_nagle_algorithm: bool,
    pub conn_retry_attempts: u32,
    pub conn_retry_initial_delay: Duration,
    pub max_output_pause_period: Option<Duration>,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            local_address: None,
            pub_address: None,
            enable_nagle_algorithm: false,
            conn_retry_attempts: 3,
            conn_retry_initial_delay: Duration::from_millis(500),
            max_output_pause_period: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpOptions {
    pub local_address: Option<IpAddr>,
    pub send_buffer_size: usize,
    pub rcv_buffer_size: usize,
}

impl Default for UdpOptions {
    fn default() -> Self {
        Self {
            local_address: None,
            send_buffer_size: DEFAULT_SEND_BUFFER,
            rcv_buffer_size: DEFAULT_SEND_BUFFER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastOptions {
    pub group_address: IpAddr,
    pub local_address: Option<IpAddr>,
    pub default_to_ipv6: bool,
    pub reliable: bool,
    pub ttl: u8,
    pub nak_delay_intervals: u32,
    pub syn_interval: Duration,
}

impl Default for MulticastOptions {
    fn default() -> Self {
        Self {
            group_address: IpAddr::V4(DEFAULT_MULTICAST_GROUP),
            local_address: None,
            default_to_ipv6: false,
            reliable: true,
            ttl: 1,
            nak_delay_intervals: 4,
            syn_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShmemOptions {
    pub pool_size: usize,
    pub datalink_control_size: usize,
}

impl Default for ShmemOptions {
    fn default() -> Self {
        Self {
            pool_size: 16 * 1024 * 1024,
            datalink_control_size: 4 * 1024,
        }
    }
}

/// Options of one transport instance; the variant always matches its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOptions {
    RtpsUdp(RtpsUdpOptions),
    Tcp(TcpOptions),
    Udp(UdpOptions),
    Multicast(MulticastOptions),
    Shmem(ShmemOptions),
}

impl TransportOptions {
    /// Default options for `kind`.
    pub fn defaults_for(kind: TransportKind) -> Self {
        match kind {
            TransportKind::RtpsUdp => TransportOptions::RtpsUdp(RtpsUdpOptions::default()),
            TransportKind::Tcp => TransportOptions::Tcp(TcpOptions::default()),
            TransportKind::Udp => TransportOptions::Udp(UdpOptions::default()),
            TransportKind::Multicast => TransportOptions::Multicast(MulticastOptions::default()),
            TransportKind::Shmem => TransportOptions::Shmem(ShmemOptions::default()),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            TransportOptions::RtpsUdp(_) => TransportKind::RtpsUdp,
            TransportOptions::Tcp(_) => TransportKind::Tcp,
            TransportOptions::Udp(_) => TransportKind::Udp,
            TransportOptions::Multicast(_) => TransportKind::Multicast,
            TransportOptions::Shmem(_) => TransportKind::Shmem,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        for kind in [
            TransportKind::RtpsUdp,
            TransportKind::Tcp,
            TransportKind::Udp,
            TransportKind::Multicast,
            TransportKind::Shmem,
        ] {
            assert_eq!(TransportKind::from_name(kind.name()), Some(kind));
            assert_eq!(TransportOptions::defaults_for(kind).kind(), kind);
        }
        assert_eq!(TransportKind::from_name(" TCP "), Some(TransportKind::Tcp));
        assert_eq!(TransportKind::from_name("quic"), None);
    }

    #[test]
    fn test_rtps_udp_defaults_follow_config() {
        let opts = RtpsUdpOptions::default();
        assert_eq!(opts.heartbeat_period, DEFAULT_HEARTBEAT_PERIOD);
        assert_eq!(opts.nak_response_delay, DEFAULT_NACK_RESPONSE_DELAY);
        assert!(opts.multicast_group_address.is_multicast());
    }
}
