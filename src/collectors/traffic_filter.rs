// Relevance filter for captured datagrams
// Keeps only UDP unicast traffic where this host is an endpoint and the
// other side sits outside the local subnet.

use crate::models::Ipv4Header;

use super::local_context::LocalNetworkContext;

/// Verdict of the relevance filter; every variant but `Relevant` names the
/// first rule the header failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    Relevant,
    NotUdp,
    Multicast,
    Broadcast,
    /// Neither address belongs to this host
    NotEndpoint,
    /// Both addresses are inside the local subnet
    LocalSubnet,
}

pub fn relevance(header: &Ipv4Header, context: &LocalNetworkContext) -> Relevance {
    if !header.is_udp() {
        return Relevance::NotUdp;
    }
    if header.is_multicast() {
        return Relevance::Multicast;
    }
    if header.is_broadcast() {
        return Relevance::Broadcast;
    }

    let source = header.source_address();
    let destination = header.destination_address();

    if !context.is_local_address(source) && !context.is_local_address(destination) {
        return Relevance::NotEndpoint;
    }
    if context.is_within_subnet(source) && context.is_within_subnet(destination) {
        return Relevance::LocalSubnet;
    }

    Relevance::Relevant
}

pub fn is_relevant(header: &Ipv4Header, context: &LocalNetworkContext) -> bool {
    relevance(header, context) == Relevance::Relevant
}
