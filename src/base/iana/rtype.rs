//! Resource Record (RR) TYPEs

//------------ Rtype ---------------------------------------------------------

int_enum! {
    /// Resource Record Types.
    ///
    /// Each resource records has a 16 bit type value indicating what kind of
    /// information is represented by the record. A query includes the type
    /// of record information is requested for.
    ///
    /// Only the address types are ever asked for by this crate. The
    /// remaining well-known values are here so answers carrying them show
    /// up sensibly in logs.
    ///
    /// The currently assigned values are maintained in an [IANA registry].
    ///
    /// [IANA registry]: http://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-4
    =>
    Rtype, u16, "TYPE";

    /// A host address.
    (A => 1, "A")

    /// An authoritative name server.
    (NS => 2, "NS")

    /// The canonical name for an alias
    (CNAME => 5, "CNAME")

    /// Marks the start of a zone of authority.
    (SOA => 6, "SOA")

    /// A domain name pointer.
    (PTR => 12, "PTR")

    /// Mail exchange.
    (MX => 15, "MX")

    /// Text strings.
    (TXT => 16, "TXT")

    /// IPv6 address.
    ///
    /// See RFC 3596.
    (AAAA => 28, "AAAA")
}

impl Rtype {
    /// Returns the length of the record data of an address record.
    ///
    /// Returns `None` for any type that isn’t an address type.
    pub fn address_len(self) -> Option<usize> {
        match self {
            Rtype::A => Some(4),
            Rtype::AAAA => Some(16),
            _ => None,
        }
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::Rtype;

    #[test]
    fn int_values() {
        assert_eq!(Rtype::A.to_int(), 1);
        assert_eq!(Rtype::AAAA.to_int(), 28);
        assert_eq!(Rtype::from_int(28), Rtype::AAAA);
        assert_eq!(format!("{}", Rtype::from_int(65280)), "TYPE65280");
    }

    #[test]
    fn address_len() {
        assert_eq!(Rtype::A.address_len(), Some(4));
        assert_eq!(Rtype::AAAA.address_len(), Some(16));
        assert_eq!(Rtype::CNAME.address_len(), None);
    }
}
