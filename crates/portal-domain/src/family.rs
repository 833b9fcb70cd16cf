//! Family member relations.

named_enum! {
    /// Relation of a family member to the employee.
    Relation, "relation" {
        Spouse => "spouse",
        Son => "son",
        Daughter => "daughter",
        Father => "father",
        Mother => "mother",
        Other => "other",
    }
}
