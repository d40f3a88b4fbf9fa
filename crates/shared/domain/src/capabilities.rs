use bitflags::bitflags;

bitflags! {
    /// Optional features a state store advertises to the engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct StoreCapabilities: u32 {
        /// One call removes a node together with everything below it.
        const RECURSIVE_DELETE = 1 << 0;

        const ALL = Self::RECURSIVE_DELETE.bits();
    }
}
