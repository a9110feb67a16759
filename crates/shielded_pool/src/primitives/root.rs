field_element! {
    /// Root of the commitment accumulator.
    ///
    /// A pure function of the ordered sequence of appended leaves. Proofs
    /// capture the root they were built against; the settlement layer accepts
    /// the current root or one from its recent history.
    pub struct CommitmentRoot;
}

field_element! {
    /// Root of the indexed nullifier tree.
    ///
    /// Non-membership witnesses are only meaningful against the root they
    /// were taken from; a root that has since advanced must be refreshed.
    pub struct NullifierRoot;
}
