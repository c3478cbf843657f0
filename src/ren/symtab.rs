// RENC, an evaluator for the Ren-C family of languages.
// Copyright (C) 2024 Matthew Rothlisberger

// RENC is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/ren/symtab.rs

// A table to associate word spellings with efficient internal IDs,
// grouping spellings that differ only in case under one canon.

// <>

use super::series::SeriesId;

/// An interned spelling; equality is identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sym(pub u32);

/// Recent context slot for a canon, consulted before a keylist scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    pub varlist: SeriesId,
    pub index: u32,
}

const MAX_HINTS: usize = 4;

struct SymEntry {
    name: Box<str>,
    canon: Sym,
    // only kept on canon entries
    hints: Vec<Hint>,
}

pub struct SymbolTable {
    // ids index entries directly; names go through open addressing
    entries: Vec<SymEntry>,

    // slots hold id + 1; zero is empty
    nm_to_id: Vec<u32>,
    // case-folded name to canon id + 1
    fold_to_canon: Vec<u32>,

    map_len: usize,
    // maintain low load ratio
    load: usize,
}

macro_rules! builtin_syms {
    ( $( $id:ident $name:literal ),+ $(,)? ) => {
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        #[repr(u32)]
        enum Builtin {
            $( $id, )+
        }

        $( pub const $id: Sym = Sym(Builtin::$id as u32); )+

        /// Spellings interned first, in ID order
        const BUILTIN_NAMES: &[&str] = &[ $( $name ),+ ];
    };
}

builtin_syms! {
    // generic actions
    SYM_ADD "add",
    SYM_SUBTRACT "subtract",
    SYM_MULTIPLY "multiply",
    SYM_DIVIDE "divide",
    SYM_REMAINDER "remainder",
    SYM_POWER "power",
    SYM_NEGATE "negate",
    SYM_ABSOLUTE "absolute",
    SYM_EVEN_Q "even?",
    SYM_ODD_Q "odd?",
    SYM_AND_T "and~",
    SYM_OR_T "or~",
    SYM_XOR_T "xor~",
    SYM_COMPLEMENT "complement",
    SYM_APPEND "append",
    SYM_INSERT "insert",
    SYM_CHANGE "change",
    SYM_REMOVE "remove",
    SYM_CLEAR "clear",
    SYM_COPY "copy",
    SYM_LENGTH_OF "length-of",
    SYM_REVERSE "reverse",
    SYM_PICK "pick",
    SYM_POKE "poke",
    SYM_FIND "find",
    SYM_SELECT "select",
    SYM_SKIP "skip",
    SYM_AT "at",
    SYM_HEAD "head",
    SYM_TAIL "tail",
    SYM_NEXT "next",
    SYM_BACK "back",
    SYM_HEAD_Q "head?",
    SYM_TAIL_Q "tail?",
    SYM_INDEX_OF "index-of",
    SYM_TAKE "take",
    SYM_SORT "sort",
    SYM_MAKE "make",
    SYM_TO "to",

    // parameter and refinement names read by natives
    SYM_VALUE "value",
    SYM_SERIES "series",
    SYM_PART "part",
    SYM_ONLY "only",
    SYM_DUP "dup",
    SYM_DEEP "deep",
    SYM_CASE "case",
    SYM_LAST "last",
    SYM_MATCH "match",
    SYM_WITH "with",
    SYM_NAME "name",
    SYM_ANY "any",
    SYM_QUIT "quit",
    SYM_SHOW "show",
    SYM_LIMIT "limit",
    SYM_ALL "all",
    SYM_DEFAULT "default",

    // words with special meaning to the evaluator
    SYM_RETURN "return",
    SYM_LEAVE "leave",
    SYM_SELF "self",
    SYM_LOCAL "local",
    SYM_OPT "opt",
    SYM_END "end",
    SYM_TIGHT "tight",
    SYM_ELLIPSIS "...",
    SYM_TRUE "true",
    SYM_FALSE "false",
    SYM_ON "on",
    SYM_OFF "off",
    SYM_YES "yes",
    SYM_NO "no",
    SYM_NATIVE "native",
    SYM_ACTION "action",

    // error context preamble
    SYM_CODE "code",
    SYM_TYPE "type",
    SYM_ID "id",
    SYM_MESSAGE "message",
    SYM_NEAR "near",
    SYM_WHERE "where",
    SYM_FILE "file",
    SYM_LINE "line",
    SYM_ARG1 "arg1",
    SYM_ARG2 "arg2",
    SYM_ARG3 "arg3",

    // error categories
    SYM_INTERNAL "internal",
    SYM_SYNTAX "syntax",
    SYM_SCRIPT "script",
    SYM_MATH "math",
    SYM_ACCESS "access",
    SYM_RESOURCE "resource",
    SYM_USER "user",

    // fields picked from scalars
    SYM_X "x",
    SYM_Y "y",
    SYM_YEAR "year",
    SYM_MONTH "month",
    SYM_DAY "day",
    SYM_TIME "time",
    SYM_ZONE "zone",
    SYM_WEEKDAY "weekday",
    SYM_YEARDAY "yearday",
    SYM_HOUR "hour",
    SYM_MINUTE "minute",
    SYM_SECOND "second",

    // function reflection
    SYM_WORDS "words",
    SYM_VALUES "values",
    SYM_BODY "body",
    SYM_SPEC "spec",
    SYM_TYPES "types",

    // roots of the system
    SYM_LIB "lib",
    SYM_USER_CTX "user-context",
    SYM_SYSTEM "system",
    SYM_OPTIONS "options",
}

impl SymbolTable {
    pub fn new(approx_cap: usize) -> Self {
        let map_len = {
            let min = approx_cap.max(BUILTIN_NAMES.len() * 2) * 11;
            (min + (min % 8)) / 8
        };

        let mut tab = Self {
            entries: Vec::with_capacity(approx_cap),
            nm_to_id: vec![0; map_len],
            fold_to_canon: vec![0; map_len],
            map_len,
            load: 0,
        };

        for (i, name) in BUILTIN_NAMES.iter().enumerate() {
            let id = tab.get_id(name);
            debug_assert_eq!(id.0 as usize, i);
        }

        tab
    }

    /// Rebuilds both maps at `factor` times the current length
    fn resize(&mut self, factor: usize) {
        let new_len = self.map_len * factor;
        let mut nm_to_id = vec![0; new_len];
        let mut fold_to_canon = vec![0; new_len];

        for (id, entry) in self.entries.iter().enumerate() {
            let slot = Self::probe_gen(&nm_to_id, Self::hash_name(entry.name.as_bytes()) % new_len);
            nm_to_id[slot] = id as u32 + 1;

            if entry.canon.0 as usize == id {
                let folded = Self::fold(&entry.name);
                let slot =
                    Self::probe_gen(&fold_to_canon, Self::hash_name(folded.as_bytes()) % new_len);
                fold_to_canon[slot] = id as u32 + 1;
            }
        }

        if cfg!(feature = "memdbg") {
            log::debug!("symbol table resized {} -> {}", self.map_len, new_len);
        }

        self.nm_to_id = nm_to_id;
        self.fold_to_canon = fold_to_canon;
        self.map_len = new_len;
    }

    /// Looks up a spelling, interning it with the next free ID if new
    pub fn get_id(&mut self, name: &str) -> Sym {
        if let Some(id) = self.lookup_by_name(name) {
            return id;
        }

        if (self.load + 1) * 3 > self.map_len {
            self.resize(2);
        }

        let ins_id = Sym(self.entries.len() as u32);
        self.direct_insert(ins_id, name);

        assert!(self.entries.len() < (1usize << 31));

        ins_id
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<Sym> {
        let tgt = Self::hash_name(name.as_bytes()) % self.map_len;

        self.find_slot(&self.nm_to_id, tgt, |id| &*self.entries[id].name == name)
            .map(|id| Sym(id as u32))
    }

    pub fn lookup_by_id(&self, id: Sym) -> Option<&str> {
        self.entries.get(id.0 as usize).map(|e| &*e.name)
    }

    /// Spelling of an interned symbol
    pub fn spelling(&self, id: Sym) -> &str {
        &self.entries[id.0 as usize].name
    }

    /// Representative of the case-insensitive class of a symbol
    #[inline(always)]
    pub fn canon(&self, id: Sym) -> Sym {
        self.entries[id.0 as usize].canon
    }

    pub fn same_canon(&self, a: Sym, b: Sym) -> bool {
        a == b || self.canon(a) == self.canon(b)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn direct_insert(&mut self, id: Sym, name: &str) {
        let folded = Self::fold(name);
        let ftgt = Self::hash_name(folded.as_bytes()) % self.map_len;
        let canon = match self.find_slot(&self.fold_to_canon, ftgt, |cid| {
            Self::fold(&self.entries[cid].name) == folded
        }) {
            Some(cid) => Sym(cid as u32),
            None => {
                let slot = Self::probe_gen(&self.fold_to_canon, ftgt);
                self.fold_to_canon[slot] = id.0 + 1;
                id
            }
        };

        self.entries.push(SymEntry {
            name: name.into(),
            canon,
            hints: Vec::new(),
        });

        let tgt = Self::hash_name(name.as_bytes()) % self.map_len;
        let slot = Self::probe_gen(&self.nm_to_id, tgt);
        self.nm_to_id[slot] = id.0 + 1;

        self.load += 1;
    }

    /// Records a context slot for a spelling's canon. New slots go
    /// last, behind the existing hints.
    pub fn add_hint(&mut self, id: Sym, hint: Hint) {
        let canon = self.canon(id);
        let hints = &mut self.entries[canon.0 as usize].hints;
        if hints.contains(&hint) {
            return;
        }
        if hints.len() >= MAX_HINTS {
            hints.pop();
        }
        hints.push(hint);
    }

    pub fn hints(&self, id: Sym) -> &[Hint] {
        &self.entries[self.canon(id).0 as usize].hints
    }

    /// Drops hints naming contexts the collector has freed
    pub fn prune_hints(&mut self, alive: impl Fn(SeriesId) -> bool) {
        for entry in self.entries.iter_mut() {
            if !entry.hints.is_empty() {
                entry.hints.retain(|h| alive(h.varlist));
            }
        }
    }

    fn find_slot(&self, map: &[u32], tgt: usize, foundp: impl Fn(usize) -> bool) -> Option<usize> {
        let len = self.map_len;

        assert!(tgt < len);

        let mut csn = tgt;

        loop {
            let cur = map[csn];

            if cur == 0 {
                return None;
            } else if foundp(cur as usize - 1) {
                return Some(cur as usize - 1);
            }

            csn += 1;
            csn %= len;

            if csn == tgt {
                panic!("rollover");
            }
        }
    }

    fn probe_gen(map: &[u32], mut tgt: usize) -> usize {
        // check slots until an empty one is found (wrapping)
        assert!(tgt < map.len());

        while map[tgt] != 0 {
            tgt += 1;

            if tgt >= map.len() {
                tgt = 0;
            }
        }

        tgt
    }

    fn fold(name: &str) -> String {
        name.to_lowercase()
    }

    fn hash_name(name: &[u8]) -> usize {
        let mut acc: usize = 1;
        for b in name {
            acc = acc.wrapping_add(acc << 5).wrapping_add(*b as _)
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_test() {
        let mut tab = SymbolTable::new(100);

        let id = tab.get_id("testsym");

        assert!(tab.lookup_by_id(Sym(100_000)).is_none());
        assert!(tab.lookup_by_name("nothere").is_none());

        assert_eq!(tab.lookup_by_id(id).unwrap(), "testsym");
        assert_eq!(tab.lookup_by_name("testsym").unwrap(), id);
    }

    #[test]
    fn builtins_first() {
        let tab = SymbolTable::new(100);
        assert_eq!(tab.spelling(SYM_ADD), "add");
        assert_eq!(tab.spelling(SYM_LENGTH_OF), "length-of");
        assert_eq!(tab.lookup_by_name("return"), Some(SYM_RETURN));
        assert_eq!(tab.canon(SYM_APPEND), SYM_APPEND);
    }

    #[test]
    fn manysym() {
        let mut tab = SymbolTable::new(8000);
        let base = tab.len() as u32;

        // generates symbols a00 - z99
        let mut acc = String::new();
        for i in 0..2600u32 {
            acc.push((i / 100 + 97) as u8 as char);
            acc.push(((i % 100) / 10 + 48) as u8 as char);
            acc.push(((i % 10) + 48) as u8 as char);

            let id = tab.get_id(&acc);

            acc.clear();

            assert_eq!(id, Sym(base + i));
        }

        assert_eq!("m13", tab.lookup_by_id(Sym(base + 1213)).unwrap());
        assert_eq!(Sym(base + 692), tab.lookup_by_name("g92").unwrap());
    }

    #[test]
    fn canon_classes() {
        let mut tab = SymbolTable::new(100);

        let lower = tab.get_id("foo");
        let upper = tab.get_id("FOO");
        let mixed = tab.get_id("Foo");

        assert_ne!(lower, upper);
        assert_eq!(tab.canon(upper), lower);
        assert_eq!(tab.canon(mixed), lower);
        assert!(tab.same_canon(upper, mixed));
        assert_eq!(tab.spelling(upper), "FOO");

        // the first spelling seen becomes the canon
        let first = tab.get_id("BAR");
        let second = tab.get_id("bar");
        assert_eq!(tab.canon(second), first);
    }

    #[test]
    fn resize() {
        let mut tab = SymbolTable::new(50);
        let start = tab.map_len;

        let id1 = tab.get_id("sea");
        let id2 = tab.get_id("mesa");
        let id3 = tab.get_id("Droll");

        tab.resize(4);

        assert_eq!(tab.map_len, start * 4);

        assert_eq!(id1, tab.get_id("sea"));
        assert_eq!(id2, tab.get_id("mesa"));
        assert_eq!(id3, tab.get_id("Droll"));
        let lower = tab.get_id("droll");
        assert_eq!(tab.canon(lower), id3);

        assert_eq!("sea", tab.lookup_by_id(id1).unwrap());
        assert_eq!("mesa", tab.lookup_by_id(id2).unwrap());
        assert_eq!("Droll", tab.lookup_by_id(id3).unwrap());
    }

    #[test]
    fn grows_under_load() {
        let mut tab = SymbolTable::new(10);
        let start = tab.map_len;
        for i in 0..5000 {
            tab.get_id(&format!("w{}", i));
        }
        assert!(tab.map_len > start);
        assert!(tab.load * 3 <= tab.map_len);
        assert_eq!(tab.spelling(tab.lookup_by_name("w4321").unwrap()), "w4321");
    }

    #[test]
    fn hints() {
        let mut tab = SymbolTable::new(10);
        let w = tab.get_id("word");
        let up = tab.get_id("WORD");

        for i in 0..6 {
            tab.add_hint(up, Hint {
                varlist: SeriesId(i),
                index: i + 1,
            });
        }
        let hs = tab.hints(w);
        assert_eq!(hs.len(), MAX_HINTS);
        assert_eq!(hs[0].varlist, SeriesId(0));
        assert_eq!(hs[MAX_HINTS - 1].varlist, SeriesId(5));

        tab.prune_hints(|s| s.0 % 2 == 0);
        assert!(tab.hints(w).iter().all(|h| h.varlist.0 % 2 == 0));
    }
}
