//! Static profession-to-dashboard routing table.

/// Access granted to one profession key.
#[derive(Debug, Clone, Copy)]
pub struct DashboardEntry {
    /// Profession key from the inclusion table
    pub profession: &'static str,
    /// Dashboard the account lands on
    pub primary: &'static str,
    /// Every dashboard the account may open
    pub allowed: &'static [&'static str],
    /// Whether an admin must sign off before first login
    pub requires_approval: bool,
}

/// Dashboard returned for invalid professionals.
pub const NO_DASHBOARD: &str = "none";

static TABLE: &[DashboardEntry] = &[
    DashboardEntry {
        profession: "medicine",
        primary: "general-medicine",
        allowed: &["general-medicine", "prescriptions", "referrals"],
        requires_approval: false,
    },
    DashboardEntry {
        profession: "nursing",
        primary: "nursing",
        allowed: &["nursing", "referrals"],
        requires_approval: false,
    },
    DashboardEntry {
        profession: "midwifery",
        primary: "midwifery",
        allowed: &["midwifery", "referrals"],
        requires_approval: false,
    },
    DashboardEntry {
        profession: "pharmacy",
        primary: "pharmacy",
        allowed: &["pharmacy"],
        requires_approval: false,
    },
    DashboardEntry {
        profession: "psychology",
        primary: "mental-health",
        allowed: &["mental-health"],
        requires_approval: true,
    },
    DashboardEntry {
        profession: "kinesiology",
        primary: "rehabilitation",
        allowed: &["rehabilitation"],
        requires_approval: true,
    },
    DashboardEntry {
        profession: "nutrition",
        primary: "nutrition",
        allowed: &["nutrition"],
        requires_approval: true,
    },
    DashboardEntry {
        profession: "medical-technology",
        primary: "laboratory",
        allowed: &["laboratory"],
        requires_approval: true,
    },
];

/// Look up the routing entry for a profession key.
#[must_use]
pub fn lookup(profession_key: &str) -> Option<&'static DashboardEntry> {
    TABLE.iter().find(|e| e.profession == profession_key)
}
