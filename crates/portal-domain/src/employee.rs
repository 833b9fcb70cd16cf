//! Employee classification enumerations.

named_enum! {
    /// Staff grade.
    Cadre, "cadre" {
        Officer => "Officer",
        Supervisor => "Supervisor",
        Skilled => "Skilled",
        SemiSkilled => "Semi-skilled",
        Unskilled => "Unskilled",
    }
}

impl Default for Cadre {
    fn default() -> Self {
        Self::Skilled
    }
}

named_enum! {
    /// Functional department an employee belongs to.
    Department, "department" {
        Operations => "Operations",
        Engineering => "Engineering",
        SignalTelecom => "Signal & Telecom",
        Electrical => "Electrical",
        Commercial => "Commercial",
        Personnel => "Personnel",
        Accounts => "Accounts",
        Medical => "Medical",
        Security => "Security",
        Stores => "Stores",
    }
}

impl Default for Department {
    fn default() -> Self {
        Self::Operations
    }
}

named_enum! {
    /// Zonal railway the employee is posted to.
    Division, "division" {
        Central => "Central Railway",
        Eastern => "Eastern Railway",
        Northern => "Northern Railway",
        NorthEastern => "North Eastern Railway",
        NortheastFrontier => "Northeast Frontier Railway",
        Southern => "Southern Railway",
        SouthCentral => "South Central Railway",
        SouthEastern => "South Eastern Railway",
        SouthEastCentral => "South East Central Railway",
        Western => "Western Railway",
        WestCentral => "West Central Railway",
        NorthWestern => "North Western Railway",
        NorthCentral => "North Central Railway",
        EastCentral => "East Central Railway",
        EastCoast => "East Coast Railway",
        SouthWestern => "South Western Railway",
    }
}

impl Default for Division {
    fn default() -> Self {
        Self::Central
    }
}
