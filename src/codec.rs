use crate::error::{CollarError, Result};
use std::fmt;

/// One element of the collar's ternary on-air alphabet.
///
/// | Symbol | Duration | Modulation     |
/// |--------|----------|----------------|
/// | `0`    | 4 ms     | unmodulated    |
/// | `1`    | 4 ms     | 5 kHz tone     |
/// | `2`    | 2 ms     | 5 kHz tone     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Zero,
    One,
    Two,
}

impl Symbol {
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            '0' => Ok(Symbol::Zero),
            '1' => Ok(Symbol::One),
            '2' => Ok(Symbol::Two),
            _ => Err(CollarError::InvalidSymbol(c)),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Symbol::Zero => '0',
            Symbol::One => '1',
            Symbol::Two => '2',
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    fn from_bit(bit: bool) -> Self {
        if bit {
            Symbol::One
        } else {
            Symbol::Zero
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Parse a string of `0`/`1`/`2` characters.
pub fn parse_symbols(bits: &str) -> Result<Vec<Symbol>> {
    bits.chars().map(Symbol::from_char).collect()
}

pub fn symbols_to_string(symbols: &[Symbol]) -> String {
    symbols.iter().map(|s| s.as_char()).collect()
}

/// Expand hex nibbles to binary symbols, most significant bit first.
///
/// Every nibble produces exactly four symbols, so leading zeros survive:
/// `"59"` becomes `01011001`.
pub fn pack(hex: &str) -> Result<Vec<Symbol>> {
    let mut out = Vec::with_capacity(hex.len() * 4);
    pack_into(hex, &mut out)?;
    Ok(out)
}

pub fn pack_into(hex: &str, out: &mut Vec<Symbol>) -> Result<()> {
    for c in hex.chars() {
        let nibble = c.to_digit(16).ok_or(CollarError::InvalidNibble(c))?;
        for shift in (0..4).rev() {
            out.push(Symbol::from_bit((nibble >> shift) & 1 == 1));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(hex: &str) -> String {
        symbols_to_string(&pack(hex).unwrap())
    }

    #[test]
    fn test_pack_keeps_leading_zeros() {
        assert_eq!(packed("6695"), "0110011010010101");
        assert_eq!(packed("59"), "01011001");
        assert_eq!(packed("a9"), "10101001");
        assert_eq!(packed("0"), "0000");
        assert_eq!(packed("f"), "1111");
    }

    #[test]
    fn test_pack_length_is_four_per_nibble() {
        for hex in ["", "1", "6a", "999a", "0123456789abcdef"] {
            assert_eq!(pack(hex).unwrap().len(), hex.len() * 4);
        }
    }

    #[test]
    fn test_pack_never_emits_two() {
        let symbols = pack("0123456789abcdef").unwrap();
        assert!(!symbols.contains(&Symbol::Two));
    }

    #[test]
    fn test_pack_accepts_uppercase() {
        assert_eq!(pack("9A").unwrap(), pack("9a").unwrap());
    }

    #[test]
    fn test_pack_rejects_non_hex() {
        assert!(matches!(pack("6g"), Err(CollarError::InvalidNibble('g'))));
        assert!(matches!(pack(" 1"), Err(CollarError::InvalidNibble(' '))));
    }

    #[test]
    fn test_symbol_parsing() {
        assert_eq!(
            parse_symbols("102").unwrap(),
            vec![Symbol::One, Symbol::Zero, Symbol::Two]
        );
        assert!(matches!(
            parse_symbols("103"),
            Err(CollarError::InvalidSymbol('3'))
        ));
    }
}
