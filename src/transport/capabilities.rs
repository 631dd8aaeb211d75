use bitflags::bitflags;

bitflags! {
    /// Upload-pack capabilities this client understands
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        const SIDE_BAND_64K = 0b0000_0001;
        const SIDE_BAND = 0b0000_0010;
        const OFS_DELTA = 0b0000_0100;
        const SHALLOW = 0b0000_1000;
        const NO_PROGRESS = 0b0001_0000;
        const THIN_PACK = 0b0010_0000;
        const MULTI_ACK = 0b0100_0000;
        const MULTI_ACK_DETAILED = 0b1000_0000;
    }
}

const NAMES: [(&str, Capabilities); 8] = [
    ("multi_ack", Capabilities::MULTI_ACK),
    ("multi_ack_detailed", Capabilities::MULTI_ACK_DETAILED),
    ("thin-pack", Capabilities::THIN_PACK),
    ("side-band", Capabilities::SIDE_BAND),
    ("side-band-64k", Capabilities::SIDE_BAND_64K),
    ("ofs-delta", Capabilities::OFS_DELTA),
    ("shallow", Capabilities::SHALLOW),
    ("no-progress", Capabilities::NO_PROGRESS),
];

impl Capabilities {
    /// Known capabilities among those a server advertised; unknown ones are ignored
    pub fn from_advertised<S: AsRef<str>>(advertised: &[S]) -> Self {
        advertised
            .iter()
            .filter_map(|name| {
                NAMES
                    .iter()
                    .find(|(known, _)| *known == name.as_ref())
                    .map(|(_, flag)| *flag)
            })
            .fold(Capabilities::empty(), |all, flag| all | flag)
    }

    /// What a clone asks for out of what the server offers
    ///
    /// `side-band-64k` is preferred over `side-band`; a shallow clone needs `shallow`.
    pub fn for_clone(offered: Capabilities) -> Self {
        let mut wanted = offered
            & (Capabilities::SIDE_BAND_64K
                | Capabilities::OFS_DELTA
                | Capabilities::SHALLOW
                | Capabilities::NO_PROGRESS);

        if !wanted.contains(Capabilities::SIDE_BAND_64K) {
            wanted |= offered & Capabilities::SIDE_BAND;
        }

        wanted
    }

    pub fn uses_side_band(&self) -> bool {
        self.intersects(Capabilities::SIDE_BAND_64K | Capabilities::SIDE_BAND)
    }

    /// Space separated names, in the order git lists them
    pub fn names(&self) -> Vec<&'static str> {
        NAMES
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_advertised_capabilities_are_ignored() {
        let offered = Capabilities::from_advertised(&[
            "multi_ack",
            "side-band-64k",
            "ofs-delta",
            "symref=HEAD:refs/heads/main",
            "agent=git/2.43.0",
        ]);

        assert_eq!(
            offered,
            Capabilities::MULTI_ACK | Capabilities::SIDE_BAND_64K | Capabilities::OFS_DELTA
        );
    }

    #[test]
    fn clones_prefer_the_larger_side_band() {
        let offered = Capabilities::SIDE_BAND | Capabilities::SIDE_BAND_64K | Capabilities::SHALLOW;

        assert_eq!(
            Capabilities::for_clone(offered).names(),
            vec!["side-band-64k", "shallow"]
        );
    }

    #[test]
    fn clones_fall_back_to_the_small_side_band() {
        let wanted = Capabilities::for_clone(Capabilities::SIDE_BAND | Capabilities::THIN_PACK);

        assert_eq!(wanted, Capabilities::SIDE_BAND);
        assert!(wanted.uses_side_band());
    }

    #[test]
    fn nothing_offered_means_nothing_requested() {
        let wanted = Capabilities::for_clone(Capabilities::empty());

        assert!(wanted.is_empty());
        assert!(!wanted.uses_side_band());
    }
}
