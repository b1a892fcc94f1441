//! DNS CLASSes.

//------------ Class ---------------------------------------------------------

int_enum! {
    /// DNS CLASSes.
    ///
    /// The domain name space is partitioned into separate classes for
    /// different network types. In practice, only the IN class is really
    /// relevant and it is the only one this crate ever asks for.
    ///
    /// See [RFC 1034] for the introduction of classes.
    ///
    /// [RFC 1034]: https://tools.ietf.org/html/rfc1034
    =>
    Class, u16, "CLASS";

    /// Internet (IN).
    ///
    /// This class is defined in RFC 1035 and really the only one relevant
    /// at all.
    (IN => 1, "IN")

    /// Chaosnet (CH).
    (CH => 3, "CH")

    /// Hesiod (HS).
    (HS => 4, "HS")

    /// Query class * (ANY).
    (ANY => 0xFF, "*")
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::Class;

    #[test]
    fn display() {
        assert_eq!(format!("{}", Class::IN), "IN");
        assert_eq!(format!("{}", Class::from_int(5)), "CLASS5");
        assert_eq!(format!("{:?}", Class::IN), "Class::IN");
    }
}
