//! The Spec Registry: a read-only database mapping `(tlv_type, docsis_version)`, and for
//! compound TLVs recursively `(parent_type, sub_tlv_type, docsis_version)`, to metadata.
//!
//! Registry data is static and built once from a declarative table (`RAW_ENTRIES` /
//! `RAW_SUB_ENTRIES` below) per the design notes' guidance to centralize TLV dispatch here
//! rather than scattering `match type { ... }` tables through the codec and validator.

use std::collections::HashMap;
use std::sync::LazyLock as Lazy;

use crate::value::ValueKind;

/// A DOCSIS release. Ordered: `V1_0 < V1_1 < V2_0 < V3_0 < V3_1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    V1_0,
    V1_1,
    V2_0,
    V3_0,
    V3_1,
}

impl Version {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1.0" => Some(Version::V1_0),
            "1.1" => Some(Version::V1_1),
            "2.0" => Some(Version::V2_0),
            "3.0" => Some(Version::V3_0),
            "3.1" => Some(Version::V3_1),
            _ => None,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Version::V1_0 => "1.0",
            Version::V1_1 => "1.1",
            Version::V2_0 => "2.0",
            Version::V3_0 => "3.0",
            Version::V3_1 => "3.1",
        };
        f.write_str(s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Uniqueness {
    Single,
    Multiple,
}

/// A numeric range constraint on a decoded scalar value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Range {
    pub min: i64,
    pub max: i64,
}

/// A registry entry describing one TLV (or sub-TLV) type.
#[derive(Clone, Debug)]
pub struct Entry {
    pub name: &'static str,
    pub description: &'static str,
    pub value_kind: ValueKind,
    pub introduced_version: Version,
    pub max_length: Option<u32>,
    pub uniqueness: Uniqueness,
    pub required_at_top_level: bool,
    pub value_constraint: Option<Range>,
    /// Alternate names accepted when a caller looks a TLV up by name (text-format round-trip).
    pub aliases: &'static [&'static str],
}

impl Entry {
    const fn new(
        name: &'static str,
        description: &'static str,
        value_kind: ValueKind,
        introduced_version: Version,
    ) -> Self {
        Entry {
            name,
            description,
            value_kind,
            introduced_version,
            max_length: None,
            uniqueness: Uniqueness::Multiple,
            required_at_top_level: false,
            value_constraint: None,
            aliases: &[],
        }
    }
}

fn unknown_entry(t: u8) -> Entry {
    Entry {
        name: Box::leak(format!("Unknown TLV {}", t).into_boxed_str()),
        description: "No registry entry for this type; preserved as opaque bytes.",
        value_kind: ValueKind::HexBytes,
        introduced_version: Version::V1_0,
        max_length: None,
        uniqueness: Uniqueness::Multiple,
        required_at_top_level: false,
        value_constraint: None,
        aliases: &[],
    }
}

macro_rules! entry {
    ($name:expr, $desc:expr, $kind:expr, $ver:expr) => {
        Entry::new($name, $desc, $kind, $ver)
    };
}

fn top_level_table() -> HashMap<u8, Entry> {
    use Version::*;

    let mut m = HashMap::new();
    m.insert(
        1,
        Entry {
            required_at_top_level: true,
            ..entry!("Downstream Frequency", "Downstream center frequency in Hz.", ValueKind::Uint32, V1_0)
        },
    );
    m.insert(2, entry!("Upstream Channel ID", "Upstream channel identifier.", ValueKind::Uint8, V1_0));
    m.insert(
        3,
        Entry {
            value_constraint: Some(Range { min: 0, max: 1 }),
            ..entry!("Network Access Control", "Enables/disables network access.", ValueKind::Uint8, V1_0)
        },
    );
    m.insert(4, entry!("Class of Service", "Legacy DOCSIS 1.0 class of service configuration.", ValueKind::Compound, V1_0));
    m.insert(
        6,
        Entry {
            max_length: Some(16),
            uniqueness: Uniqueness::Single,
            ..entry!("CM-MIC", "Cable modem message integrity check.", ValueKind::HexBytes, V1_0)
        },
    );
    m.insert(
        7,
        Entry {
            max_length: Some(16),
            uniqueness: Uniqueness::Single,
            ..entry!("CMTS-MIC", "CMTS message integrity check.", ValueKind::HexBytes, V1_0)
        },
    );
    m.insert(9, entry!("Software Upgrade Filename", "CM software image filename.", ValueKind::String, V1_0));
    m.insert(10, entry!("SNMP Write-Access Control", "Deprecated SNMP write access control.", ValueKind::Compound, V1_0));
    m.insert(11, entry!("SNMP MIB Object", "SNMP MIB object to set at provisioning time.", ValueKind::Compound, V1_0));
    m.insert(12, entry!("CPE Ethernet MAC Address", "Deprecated single CPE MAC restriction.", ValueKind::Mac, V1_0));
    m.insert(13, entry!("Baseline Privacy Configuration", "BPI/BPI+ configuration settings.", ValueKind::Compound, V1_0));
    m.insert(14, entry!("Manufacturer CVC", "Manufacturer code verification certificate.", ValueKind::HexBytes, V1_1));
    m.insert(17, entry!("Downstream Service Flow", "Downstream service flow encoding (DOCSIS 1.1+).", ValueKind::Compound, V1_1));
    m.insert(18, entry!("Upstream Service Flow", "Upstream service flow encoding (DOCSIS 1.1+).", ValueKind::Compound, V1_1));
    m.insert(19, entry!("Upstream Packet Classification", "Upstream classifier encoding.", ValueKind::Compound, V1_1));
    m.insert(20, entry!("Downstream Packet Classification", "Downstream classifier encoding.", ValueKind::Compound, V1_1));
    m.insert(22, entry!("Upstream Drop Classification", "Upstream drop classifier encoding.", ValueKind::Compound, V1_1));
    m.insert(23, entry!("Downstream Drop Classification", "Downstream drop classifier encoding.", ValueKind::Compound, V1_1));
    m.insert(24, entry!("Upstream Service Flow Ref", "Upstream service flow reference encoding.", ValueKind::Compound, V1_1));
    m.insert(25, entry!("Downstream Service Flow Ref", "Downstream service flow reference encoding.", ValueKind::Compound, V1_1));
    m.insert(26, entry!("Subscriber Management CPE IP", "Subscriber management CPE IP table.", ValueKind::Compound, V1_1));
    m.insert(27, entry!("Subscriber Management Filter Groups", "Subscriber management filter group assignment.", ValueKind::Compound, V1_1));
    m.insert(28, entry!("Maximum CPE IP Addresses", "Maximum number of CPE IP addresses.", ValueKind::Uint8, V1_1));
    m.insert(29, entry!("TFTP-Server Timestamp", "TFTP server timestamp used for MIC coverage.", ValueKind::Uint32, V1_1));
    m.insert(30, entry!("TFTP-Server Provisioned Modem Address", "IP address of the provisioning TFTP server.", ValueKind::Ipv4, V1_1));
    m.insert(32, entry!("Upstream Drop Packet Classification", "Alias of TLV 22 retained for legacy configs.", ValueKind::Compound, V1_1));
    m.insert(33, entry!("Subscriber Management Control", "Subscriber management control.", ValueKind::Uint8, V1_1));
    m.insert(34, entry!("SNMPv3 Kickstart Value", "SNMPv3 kickstart security name / manager IP.", ValueKind::Compound, V2_0));
    m.insert(35, entry!("Docsis 2.0 Enable", "Enables DOCSIS 2.0 mode of operation.", ValueKind::Uint8, V2_0));
    m.insert(36, entry!("MAC Multiplexing", "MAC address multiplexing threshold.", ValueKind::Compound, V2_0));
    m.insert(37, entry!("PHS Rule", "Payload header suppression rule encoding.", ValueKind::Compound, V1_1));
    m.insert(38, entry!("HMAC Digest", "Authentication digest for dynamic service messages.", ValueKind::HexBytes, V1_1));
    m.insert(39, entry!("MAC Address", "Modem MAC address restriction.", ValueKind::Mac, V1_0));
    m.insert(40, entry!("Vendor Identifier", "Vendor organizationally unique identifier.", ValueKind::HexBytes, V1_0));
    m.insert(41, entry!("CM Certificate", "CM device certificate.", ValueKind::HexBytes, V1_1));
    m.insert(42, entry!("CA Certificate", "Certificate authority certificate.", ValueKind::HexBytes, V1_1));
    m.insert(43, entry!("DOCSIS Extension Field", "Extension field container.", ValueKind::Compound, V2_0));
    m.insert(60, entry!("DOCSIS Version Number", "Minimum DOCSIS version the CM must support.", ValueKind::Uint8, V2_0));
    m.insert(62, entry!("OFDM Downstream Profile", "DOCSIS 3.1 OFDM downstream channel profile.", ValueKind::Compound, V3_1));
    m.insert(63, entry!("OFDMA Upstream Profile", "DOCSIS 3.1 OFDMA upstream channel profile.", ValueKind::Compound, V3_1));
    m.insert(64, entry!("PacketCable Configuration", "PacketCable MTA provisioning data, ASN.1 DER encoded.", ValueKind::Asn1, V1_1));
    m.insert(
        65,
        Entry {
            aliases: &["Energy Management"],
            ..entry!("L2VPN MAC Aging", "L2VPN MAC address aging timer (aka Energy Management in older documents).", ValueKind::Uint32, V3_0)
        },
    );
    m.insert(67, entry!("Downstream Channel List", "DOCSIS 3.0 downstream bonding group channel list.", ValueKind::Compound, V3_0));
    m.insert(68, entry!("Upstream Channel List", "DOCSIS 3.0 upstream bonding group channel list.", ValueKind::Compound, V3_0));
    m.insert(72, entry!("MTA Endpoint Config", "PacketCable MTA endpoint voice configuration.", ValueKind::Compound, V2_0));
    m.insert(77, entry!("DLS Encoding", "DOCSIS Light Sleep (energy management) encoding.", ValueKind::Compound, V3_1));
    m
}

fn sub_table() -> HashMap<(u8, u8), Entry> {
    use Version::*;
    let mut m = HashMap::new();

    // Downstream Service Flow (17) / Upstream Service Flow (18) share a sub-schema.
    for parent in [17u8, 18u8] {
        m.insert((parent, 1), entry!("Service Flow Reference", "16-bit reference used by classifiers.", ValueKind::Uint16, V1_1));
        m.insert((parent, 2), entry!("Service Flow ID", "Assigned service flow identifier.", ValueKind::Uint32, V1_1));
        m.insert((parent, 6), entry!("QoS Parameter Set Type", "Which message types this parameter set applies to.", ValueKind::Uint8, V1_1));
        m.insert((parent, 7), entry!("QoS Parameter Set Type", "Which message types this parameter set applies to.", ValueKind::Uint8, V1_1));
    }

    // Upstream/Downstream Service Flow Ref (24/25).
    for parent in [24u8, 25u8] {
        m.insert((parent, 1), entry!("Service Flow Reference", "16-bit reference used by classifiers.", ValueKind::Uint16, V1_1));
        m.insert((parent, 7), entry!("QoS Parameter Set Type", "Which message types this parameter set applies to.", ValueKind::Uint8, V1_1));
    }

    // Packet Classification (19/20/22/23).
    for parent in [19u8, 20u8, 22u8, 23u8] {
        m.insert((parent, 1), entry!("Classifier Reference", "Classifier reference id.", ValueKind::Uint16, V1_1));
        m.insert((parent, 2), entry!("Classifier ID", "Assigned classifier id.", ValueKind::Uint16, V1_1));
        m.insert((parent, 3), entry!("Service Flow Reference", "Service flow this classifier attaches to.", ValueKind::Uint16, V1_1));
        m.insert((parent, 5), entry!("IP Protocol", "IP protocol number to match.", ValueKind::Uint16, V1_1));
    }

    m.insert((13, 1), entry!("BPI SA Map Wait Timeout", "BPI SA map wait timeout in seconds.", ValueKind::Uint32, V1_0));
    m.insert((13, 2), entry!("BPI SA Map Max Retries", "BPI SA map max retries.", ValueKind::Uint8, V1_0));

    m
}

static TOP_LEVEL: Lazy<HashMap<u8, Entry>> = Lazy::new(top_level_table);
static SUB: Lazy<HashMap<(u8, u8), Entry>> = Lazy::new(sub_table);

/// Exact lookup for a top-level TLV type. Unknown types never fail: a synthesized
/// `"Unknown TLV N"` entry with `value_kind = hex_bytes` is returned so that round-trip of
/// unrecognized TLVs is always possible.
pub fn info(tlv_type: u8) -> Entry {
    TOP_LEVEL
        .get(&tlv_type)
        .cloned()
        .unwrap_or_else(|| unknown_entry(tlv_type))
}

/// Exact lookup for a sub-TLV nested under `parent_type`.
pub fn info_sub(parent_type: u8, sub_type: u8) -> Entry {
    SUB.get(&(parent_type, sub_type))
        .cloned()
        .unwrap_or_else(|| unknown_entry(sub_type))
}

pub fn has_sub_schema(parent_type: u8) -> bool {
    matches!(
        TOP_LEVEL.get(&parent_type).map(|e| &e.value_kind),
        Some(ValueKind::Compound)
    )
}

/// All top-level TLV types in the registry whose `introduced_version <= version`, in ascending
/// type order. Used by the validator and by template generation in external collaborators.
pub fn supported_types(version: Version) -> Vec<u8> {
    let mut types: Vec<u8> = TOP_LEVEL
        .iter()
        .filter(|(_, e)| e.introduced_version <= version)
        .map(|(t, _)| *t)
        .collect();
    types.sort_unstable();
    types
}

/// Top-level TLV types marked `required_at_top_level`, in ascending order.
pub fn required_top_level_types() -> Vec<u8> {
    let mut types: Vec<u8> = TOP_LEVEL
        .iter()
        .filter(|(_, e)| e.required_at_top_level)
        .map(|(t, _)| *t)
        .collect();
    types.sort_unstable();
    types
}

pub fn is_vendor(t: u8) -> bool {
    crate::types::is_vendor_type(t)
}

/// Resolve a TLV by its canonical name or any registered alias, for text-format round-tripping.
pub fn lookup_by_name(name: &str) -> Option<u8> {
    TOP_LEVEL
        .iter()
        .find(|(_, e)| e.name == name || e.aliases.contains(&name))
        .map(|(t, _)| *t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_synthesizes_entry() {
        let e = info(250);
        assert_eq!(e.name, "Unknown TLV 250");
        assert_eq!(e.value_kind, ValueKind::HexBytes);
    }

    #[test]
    fn known_entry_has_introduced_version_at_or_below_its_listing() {
        for t in supported_types(Version::V3_0) {
            let e = info(t);
            assert!(e.introduced_version <= Version::V3_0);
        }
    }

    #[test]
    fn tlv_65_accepts_energy_management_alias() {
        assert_eq!(lookup_by_name("L2VPN MAC Aging"), Some(65));
        assert_eq!(lookup_by_name("Energy Management"), Some(65));
    }

    #[test]
    fn version_ordering() {
        assert!(Version::V1_0 < Version::V1_1);
        assert!(Version::V3_0 < Version::V3_1);
    }
}
