use core::fmt::{self, Write};

pub fn write_ascii_escaped(formatter: &mut fmt::Formatter, input: &[u8]) -> fmt::Result {
    for byte in input {
        for esc_byte in core::ascii::escape_default(*byte) {
            formatter.write_char(esc_byte as char)?;
        }
    }
    Ok(())
}

/// Prints fields as `{NAME: value, ...}`, escaping non-printable bytes of the values.
pub fn write_record<'a>(
    f: &mut fmt::Formatter,
    fields: impl Iterator<Item = (&'a str, &'a [u8])>,
) -> fmt::Result {
    f.write_str("{")?;
    for (i, (name, value)) in fields.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(name)?;
        f.write_str(": ")?;
        write_ascii_escaped(f, value)?;
    }
    f.write_str("}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrayvec::ArrayString;

    struct Escaped(&'static [u8]);

    impl fmt::Debug for Escaped {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write_ascii_escaped(f, self.0)
        }
    }

    struct Fields(&'static [(&'static str, &'static [u8])]);

    impl fmt::Debug for Fields {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write_record(f, self.0.iter().copied())
        }
    }

    fn render(value: &dyn fmt::Debug) -> ArrayString<[u8; 100]> {
        let mut output = ArrayString::<[_; 100]>::new();
        write!(&mut output, "{:?}", value).unwrap();
        output
    }

    #[test]
    fn test_write_ascii_escaped() {
        assert_eq!(&render(&Escaped(b"W9PVA")), "W9PVA");
        assert_eq!(&render(&Escaped(b"line\r\nbreak")), "line\\r\\nbreak");
        assert_eq!(&render(&Escaped(b"Eyeball \xf0\x9f\x91\x80")), "Eyeball \\xf0\\x9f\\x91\\x80");
        assert_eq!(&render(&Escaped(b"a\x00b")), "a\\x00b");
    }

    #[test]
    fn test_write_record() {
        assert_eq!(&render(&Fields(&[])), "{}");
        assert_eq!(
            &render(&Fields(&[("BAND", b"20M"), ("CALL", b"K9CTS")])),
            "{BAND: 20M, CALL: K9CTS}"
        );
    }
}
