//! Travel pass enumerations.

named_enum! {
    /// Entitlement under which a pass is issued.
    PassType, "pass type" {
        Privilege => "Privilege",
        School => "School",
        Pto => "PTO",
        Other => "Other",
    }
}

named_enum! {
    /// Class of train the pass is valid on.
    TrainType, "train type" {
        Local => "Local",
        Express => "Express",
        Mail => "Mail",
        Rajdhani => "Rajdhani",
        Shatabdi => "Shatabdi",
        Other => "Other",
    }
}

named_enum! {
    /// Lifecycle status of a pass. Only `Active` passes count towards expiry warnings.
    PassStatus, "pass status" {
        Active => "active",
        Expired => "expired",
        Revoked => "revoked",
    }
}

impl Default for PassStatus {
    fn default() -> Self {
        Self::Active
    }
}
