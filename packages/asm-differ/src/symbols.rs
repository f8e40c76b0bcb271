use std::collections::{BTreeMap, HashMap};

/// A named, addressed entity from an executable's symbol table. `name` is
/// the exact decorated symbol and serves as the pairing key between two
/// executables; `demangled_name` is for display only.
#[derive(Debug, Clone)]
pub struct ExeSymbol {
    pub name: String,
    pub demangled_name: String,
    pub address: u64,
    pub size: u64,
}

/// Symbol storage indexed by start address and by decorated name.
///
/// BTreeMap gives O(log n) range queries for the containing-address
/// lookup; the name map is the hot path when pairing two executables.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<ExeSymbol>,
    by_address: BTreeMap<u64, u32>,
    by_name: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a symbol. An existing symbol of the same name is replaced
    /// only when `overwrite` is set.
    pub fn insert(&mut self, symbol: ExeSymbol, overwrite: bool) {
        if let Some(&idx) = self.by_name.get(&symbol.name) {
            if overwrite {
                self.by_address.remove(&self.symbols[idx as usize].address);
                self.by_address.insert(symbol.address, idx);
                self.symbols[idx as usize] = symbol;
            }
            return;
        }
        let idx = self.symbols.len() as u32;
        self.by_address.insert(symbol.address, idx);
        self.by_name.insert(symbol.name.clone(), idx);
        self.symbols.push(symbol);
    }

    /// Finds the symbol containing the given address. Size-zero marker
    /// symbols only match their exact address.
    pub fn lookup(&self, address: u64) -> Option<&ExeSymbol> {
        let (&start_addr, &idx) = self.by_address.range(..=address).next_back()?;
        let symbol = &self.symbols[idx as usize];
        if symbol.size > 0 && address < start_addr + symbol.size {
            return Some(symbol);
        }
        if symbol.size == 0 && address == start_addr {
            return Some(symbol);
        }
        None
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ExeSymbol> {
        self.by_name.get(name).map(|&idx| &self.symbols[idx as usize])
    }

    pub fn get_by_address(&self, address: u64) -> Option<&ExeSymbol> {
        self.by_address.get(&address).map(|&idx| &self.symbols[idx as usize])
    }

    pub fn symbols(&self) -> &[ExeSymbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Best-effort demangling: Rust first, C++ second, raw name otherwise.
pub fn demangle_name(raw_name: &str) -> String {
    let rust_demangled = rustc_demangle::demangle(raw_name).to_string();
    if rust_demangled != raw_name {
        return rust_demangled;
    }
    if let Ok(sym) = cpp_demangle::Symbol::new(raw_name.as_bytes()) {
        if let Ok(demangled) = sym.demangle(&cpp_demangle::DemangleOptions::default()) {
            return demangled;
        }
    }
    raw_name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, address: u64, size: u64) -> ExeSymbol {
        ExeSymbol {
            name: name.to_string(),
            demangled_name: name.to_string(),
            address,
            size,
        }
    }

    #[test]
    fn containing_lookup() {
        let mut table = SymbolTable::new();
        table.insert(sym("alpha", 0x1000, 0x20), false);
        table.insert(sym("beta", 0x1020, 0x10), false);

        assert_eq!(table.lookup(0x1000).unwrap().name, "alpha");
        assert_eq!(table.lookup(0x101f).unwrap().name, "alpha");
        assert_eq!(table.lookup(0x1020).unwrap().name, "beta");
        assert!(table.lookup(0x1030).is_none());
    }

    #[test]
    fn marker_symbol_matches_exact_address_only() {
        let mut table = SymbolTable::new();
        table.insert(sym("marker", 0x2000, 0), false);
        assert!(table.lookup(0x2000).is_some());
        assert!(table.lookup(0x2001).is_none());
    }

    #[test]
    fn insert_respects_overwrite() {
        let mut table = SymbolTable::new();
        table.insert(sym("alpha", 0x1000, 0x10), false);
        table.insert(sym("alpha", 0x2000, 0x10), false);
        assert_eq!(table.get_by_name("alpha").unwrap().address, 0x1000);
        table.insert(sym("alpha", 0x2000, 0x10), true);
        assert_eq!(table.get_by_name("alpha").unwrap().address, 0x2000);
        assert_eq!(table.len(), 1);
    }
}
