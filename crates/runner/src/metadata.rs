//! Symbol-name resolution for `infoAt` logging and the "stuck in sleep" guard (SPEC_FULL.md §3:
//! the `--meta` file is a bare JSON array of `{name, start}` in ascending address order, the
//! shape the Go toolchain's symbol table producer emits. A symbol's length is implicit — the
//! next entry's `start`, or `u32::MAX` for the last.

use serde::{Deserialize, Serialize};

/// One entry as it appears on disk: just a name and a start address, in ascending order.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Symbol {
    name: String,
    start: u32,
}

/// An ordered table of address ranges to symbol names, loaded from the `--meta` file.
///
/// Deserializes directly from the bare-array wire shape; [Metadata::resolve] derives each
/// symbol's end address from the next entry's `start` rather than storing it explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    symbols: Vec<Symbol>,
}

impl Metadata {
    /// Resolve `pc` to the name of the symbol whose range contains it, if any. Assumes
    /// `symbols` is sorted ascending by `start`, as the Go toolchain producer emits it.
    pub fn resolve(&self, pc: u32) -> Option<&str> {
        self.symbols
            .iter()
            .zip(self.symbols.iter().skip(1).map(|s| s.start).chain(std::iter::once(u32::MAX)))
            .find(|(s, end)| pc >= s.start && pc < *end)
            .map(|(s, _)| s.name.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolves_address_within_range() {
        let meta = Metadata {
            symbols: vec![
                Symbol { name: "main".into(), start: 0x1000 },
                Symbol { name: "helper".into(), start: 0x1100 },
            ],
        };
        assert_eq!(meta.resolve(0x1050), Some("main"));
        assert_eq!(meta.resolve(0x1100), Some("helper"));
    }

    #[test]
    fn address_outside_every_range_is_unresolved() {
        let meta = Metadata { symbols: vec![Symbol { name: "main".into(), start: 0x1000 }] };
        assert_eq!(meta.resolve(0x0fff), None);
    }

    #[test]
    fn last_symbol_extends_to_u32_max() {
        let meta = Metadata { symbols: vec![Symbol { name: "main".into(), start: 0x1000 }] };
        assert_eq!(meta.resolve(0xffff_ffff), Some("main"));
    }

    #[test]
    fn deserializes_the_documented_go_toolchain_shape() {
        let json = r#"[{"name":"main","start":4096},{"name":"helper","start":4352}]"#;
        let meta: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.resolve(4200), Some("main"));
        assert_eq!(meta.resolve(4352), Some("helper"));
        assert_eq!(meta.resolve(4095), None);
    }
}
