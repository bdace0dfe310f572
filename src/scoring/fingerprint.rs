//! SMILES parsing and circular (Morgan-style) fingerprints.
//!
//! The parser covers the subset of SMILES used by drug structure tables:
//! organic-subset and bracket atoms, branches, ring closures (including
//! `%nn`), explicit bonds and disconnected components. Stereo marks are
//! accepted and ignored. Kekulé six-membered rings are perceived as
//! aromatic so both spellings of a benzene ring fingerprint the same.
//!
//! Fingerprints hash each atom's environment out to the given radius and
//! fold the identifiers into a fixed-width bit vector. Identifiers are
//! derived with SHA-256, so they are stable across platforms and releases.

use std::collections::{HashMap, VecDeque};

use sha2::{Digest, Sha256};
use thiserror::Error;

pub const FINGERPRINT_BITS: usize = 1024;
pub const MORGAN_RADIUS: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    #[error("empty SMILES string")]
    Empty,

    #[error("unexpected '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("bracket atom at position {0} is not closed")]
    UnclosedBracket(usize),

    #[error("unbalanced parenthesis at position {0}")]
    UnbalancedParenthesis(usize),

    #[error("ring bond {0} is never closed")]
    UnclosedRing(u32),

    #[error("bond at position {0} is not followed by an atom")]
    DanglingBond(usize),

    #[error("ring bond {ring} at position {pos} repeats an existing bond")]
    InvalidRingBond { ring: u32, pos: usize },
}

// ═══════════════════════════════════════════
// Molecular graph
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '-' | '/' | '\\' => Some(Self::Single),
            '=' => Some(Self::Double),
            '#' => Some(Self::Triple),
            '$' => Some(Self::Quadruple),
            ':' => Some(Self::Aromatic),
            _ => None,
        }
    }

    /// Contribution to the valence of a Kekulé structure.
    fn valence(self) -> u32 {
        match self {
            Self::Single | Self::Aromatic => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Quadruple => 4,
        }
    }

    fn code(self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Quadruple => 4,
            Self::Aromatic => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub element: String,
    pub aromatic: bool,
    pub charge: i32,
    pub isotope: Option<u32>,
    /// Total attached hydrogens, explicit or implicit.
    pub hydrogens: u32,
    bracket: bool,
}

impl Atom {
    fn organic(element: &str, aromatic: bool) -> Self {
        Self {
            element: element.to_string(),
            aromatic,
            charge: 0,
            isotope: None,
            hydrogens: 0,
            bracket: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
}

/// Heavy-atom graph. Hydrogens are folded into atom counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// Per atom: (neighbor atom, bond index).
    neighbors: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.neighbors[atom].len()
    }

    fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.neighbors.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Returns false for a self-bond or a bond that already exists.
    fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) -> bool {
        if a == b || self.neighbors[a].iter().any(|&(n, _)| n == b) {
            return false;
        }
        let index = self.bonds.len();
        self.bonds.push(Bond { a, b, order });
        self.neighbors[a].push((b, index));
        self.neighbors[b].push((a, index));
        true
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].aromatic && self.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn assign_implicit_hydrogens(&mut self) {
        for i in 0..self.atoms.len() {
            if self.atoms[i].bracket {
                continue;
            }
            let allowed: &[u32] = match self.atoms[i].element.as_str() {
                "B" => &[3],
                "C" => &[4],
                "N" | "P" => &[3, 5],
                "O" => &[2],
                "S" => &[2, 4, 6],
                "F" | "Cl" | "Br" | "I" => &[1],
                _ => &[],
            };
            let mut used: u32 = self.neighbors[i]
                .iter()
                .map(|&(_, bond)| self.bonds[bond].order.valence())
                .sum();
            if self.atoms[i].aromatic {
                used += 1;
            }
            self.atoms[i].hydrogens = allowed
                .iter()
                .find(|&&v| v >= used)
                .map(|v| v - used)
                .unwrap_or(0);
        }
    }

    /// Whether each bond lies on a cycle.
    fn ring_bonds(&self) -> Vec<bool> {
        (0..self.bonds.len())
            .map(|skip| {
                let Bond { a, b, .. } = self.bonds[skip];
                let mut seen = vec![false; self.atoms.len()];
                let mut queue = VecDeque::from([a]);
                seen[a] = true;
                while let Some(atom) = queue.pop_front() {
                    for &(next, bond) in &self.neighbors[atom] {
                        if bond == skip || seen[next] {
                            continue;
                        }
                        if next == b {
                            return true;
                        }
                        seen[next] = true;
                        queue.push_back(next);
                    }
                }
                false
            })
            .collect()
    }

    fn ring_atoms(&self) -> Vec<bool> {
        let mut in_ring = vec![false; self.atoms.len()];
        for (bond, ring) in self.bonds.iter().zip(self.ring_bonds()) {
            if ring {
                in_ring[bond.a] = true;
                in_ring[bond.b] = true;
            }
        }
        in_ring
    }

    /// Simple six-membered cycles as atom sequences.
    fn six_rings(&self) -> Vec<[usize; 6]> {
        fn extend(mol: &Molecule, path: &mut Vec<usize>, rings: &mut Vec<[usize; 6]>) {
            let start = path[0];
            let last = path[path.len() - 1];
            if path.len() == 6 {
                if path[1] < path[5] && mol.neighbors[last].iter().any(|&(n, _)| n == start) {
                    let mut ring = [0; 6];
                    ring.copy_from_slice(path);
                    rings.push(ring);
                }
                return;
            }
            for &(next, _) in &mol.neighbors[last] {
                if next > start && !path.contains(&next) {
                    path.push(next);
                    extend(mol, path, rings);
                    path.pop();
                }
            }
        }

        let mut rings = Vec::new();
        for start in 0..self.atoms.len() {
            let mut path = vec![start];
            extend(self, &mut path, &mut rings);
        }
        rings
    }

    fn bond_between(&self, a: usize, b: usize) -> Option<usize> {
        self.neighbors[a].iter().find(|&&(n, _)| n == b).map(|&(_, bond)| bond)
    }

    /// Mark Kekulé six-membered carbon/nitrogen rings as aromatic. Runs to
    /// a fixed point so fused systems drawn in either Kekulé form resolve.
    fn perceive_aromatic_rings(&mut self) {
        let rings = self.six_rings();
        let mut changed = true;
        while changed {
            changed = false;
            for ring in &rings {
                let Some(ring_bonds) = self.ring_bond_indices(ring) else {
                    continue;
                };
                if ring_bonds.iter().all(|&b| self.bonds[b].order == BondOrder::Aromatic) {
                    continue;
                }
                if self.is_kekule_aromatic(ring, &ring_bonds) {
                    for &atom in ring {
                        self.atoms[atom].aromatic = true;
                    }
                    for &bond in &ring_bonds {
                        self.bonds[bond].order = BondOrder::Aromatic;
                    }
                    changed = true;
                }
            }
        }
    }

    fn ring_bond_indices(&self, ring: &[usize; 6]) -> Option<Vec<usize>> {
        (0..6)
            .map(|i| self.bond_between(ring[i], ring[(i + 1) % 6]))
            .collect()
    }

    fn is_kekule_aromatic(&self, ring: &[usize; 6], ring_bonds: &[usize]) -> bool {
        let pi_bond = |order: BondOrder| matches!(order, BondOrder::Double | BondOrder::Aromatic);

        ring.iter().all(|&atom| {
            let element_ok = matches!(self.atoms[atom].element.as_str(), "C" | "N");
            let ring_pi = self.neighbors[atom]
                .iter()
                .any(|&(_, bond)| ring_bonds.contains(&bond) && pi_bond(self.bonds[bond].order));
            let exocyclic_double = self.neighbors[atom].iter().any(|&(_, bond)| {
                !ring_bonds.contains(&bond) && self.bonds[bond].order == BondOrder::Double
            });
            element_ok && ring_pi && !exocyclic_double
        }) && ring_bonds
            .iter()
            .all(|&b| matches!(self.bonds[b].order, BondOrder::Single | BondOrder::Double | BondOrder::Aromatic))
    }
}

// ═══════════════════════════════════════════
// Parser
// ═══════════════════════════════════════════

pub fn parse_smiles(smiles: &str) -> Result<Molecule, SmilesError> {
    let chars: Vec<char> = smiles.trim().chars().collect();
    if chars.is_empty() {
        return Err(SmilesError::Empty);
    }

    let mut mol = Molecule::default();
    let mut prev: Option<usize> = None;
    let mut branches: Vec<(Option<usize>, usize)> = Vec::new();
    let mut pending: Option<(BondOrder, usize)> = None;
    let mut rings: HashMap<u32, (usize, Option<BondOrder>)> = HashMap::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                if prev.is_none() {
                    return Err(SmilesError::UnexpectedChar { ch: c, pos: i });
                }
                branches.push((prev, i));
                i += 1;
            }
            ')' => {
                let Some((atom, _)) = branches.pop() else {
                    return Err(SmilesError::UnbalancedParenthesis(i));
                };
                if let Some((_, pos)) = pending {
                    return Err(SmilesError::DanglingBond(pos));
                }
                prev = atom;
                i += 1;
            }
            '.' => {
                if let Some((_, pos)) = pending {
                    return Err(SmilesError::DanglingBond(pos));
                }
                prev = None;
                i += 1;
            }
            '0'..='9' | '%' => {
                let pos = i;
                let ring = if c == '%' {
                    let digits: String = chars.iter().skip(i + 1).take(2).collect();
                    if digits.len() != 2 || !digits.chars().all(|d| d.is_ascii_digit()) {
                        return Err(SmilesError::UnexpectedChar { ch: c, pos });
                    }
                    i += 3;
                    digits.parse::<u32>().unwrap_or_default()
                } else {
                    i += 1;
                    c.to_digit(10).unwrap_or_default()
                };
                let Some(atom) = prev else {
                    return Err(SmilesError::UnexpectedChar { ch: c, pos });
                };
                let bond = pending.take().map(|(order, _)| order);
                match rings.remove(&ring) {
                    Some((open, open_bond)) => {
                        let order = bond
                            .or(open_bond)
                            .unwrap_or_else(|| mol.default_order(open, atom));
                        if !mol.add_bond(open, atom, order) {
                            return Err(SmilesError::InvalidRingBond { ring, pos });
                        }
                    }
                    None => {
                        rings.insert(ring, (atom, bond));
                    }
                }
            }
            _ if BondOrder::from_symbol(c).is_some() => {
                if prev.is_none() || pending.is_some() {
                    return Err(SmilesError::UnexpectedChar { ch: c, pos: i });
                }
                pending = BondOrder::from_symbol(c).map(|order| (order, i));
                i += 1;
            }
            _ => {
                let (atom, next) = if c == '[' {
                    parse_bracket_atom(&chars, i)?
                } else {
                    parse_organic_atom(&chars, i)?
                };
                let index = mol.add_atom(atom);
                if let Some(p) = prev {
                    let order = pending
                        .take()
                        .map(|(order, _)| order)
                        .unwrap_or_else(|| mol.default_order(p, index));
                    mol.add_bond(p, index, order);
                }
                prev = Some(index);
                i = next;
            }
        }
    }

    if let Some((_, pos)) = pending {
        return Err(SmilesError::DanglingBond(pos));
    }
    if let Some(&(_, pos)) = branches.last() {
        return Err(SmilesError::UnbalancedParenthesis(pos));
    }
    if let Some(&ring) = rings.keys().min() {
        return Err(SmilesError::UnclosedRing(ring));
    }

    mol.assign_implicit_hydrogens();
    mol.perceive_aromatic_rings();
    Ok(mol)
}

fn parse_organic_atom(chars: &[char], i: usize) -> Result<(Atom, usize), SmilesError> {
    let next = chars.get(i + 1).copied();
    let atom = match (chars[i], next) {
        ('C', Some('l')) => return Ok((Atom::organic("Cl", false), i + 2)),
        ('B', Some('r')) => return Ok((Atom::organic("Br", false), i + 2)),
        (c @ ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I'), _) => Atom::organic(&c.to_string(), false),
        (c @ ('b' | 'c' | 'n' | 'o' | 'p' | 's'), _) => {
            Atom::organic(&c.to_ascii_uppercase().to_string(), true)
        }
        ('*', _) => Atom::organic("*", false),
        (ch, _) => return Err(SmilesError::UnexpectedChar { ch, pos: i }),
    };
    Ok((atom, i + 1))
}

fn parse_bracket_atom(chars: &[char], start: usize) -> Result<(Atom, usize), SmilesError> {
    let peek = |i: usize| chars.get(i).copied().ok_or(SmilesError::UnclosedBracket(start));
    let mut i = start + 1;

    let isotope = read_number(chars, &mut i);

    let first = peek(i)?;
    let (element, aromatic) = if first.is_ascii_uppercase() {
        i += 1;
        match chars.get(i) {
            Some(&l) if l.is_ascii_lowercase() => {
                i += 1;
                (format!("{first}{l}"), false)
            }
            _ => (first.to_string(), false),
        }
    } else if first.is_ascii_lowercase() {
        let pair: String = chars.iter().skip(i).take(2).collect();
        if pair == "se" || pair == "as" {
            i += 2;
            (format!("{}{}", pair[..1].to_ascii_uppercase(), &pair[1..]), true)
        } else if matches!(first, 'b' | 'c' | 'n' | 'o' | 'p' | 's') {
            i += 1;
            (first.to_ascii_uppercase().to_string(), true)
        } else {
            return Err(SmilesError::UnexpectedChar { ch: first, pos: i });
        }
    } else if first == '*' {
        i += 1;
        ("*".to_string(), false)
    } else {
        return Err(SmilesError::UnexpectedChar { ch: first, pos: i });
    };

    // Chirality is ignored.
    while peek(i)? == '@' {
        i += 1;
    }
    let tag: String = chars.iter().skip(i).take(2).collect();
    if matches!(tag.as_str(), "TH" | "AL" | "SP" | "TB" | "OH") {
        i += 2;
        read_number(chars, &mut i);
    }

    let mut hydrogens = 0;
    if peek(i)? == 'H' {
        i += 1;
        hydrogens = read_number(chars, &mut i).unwrap_or(1);
    }

    let mut charge = 0i32;
    let sign = peek(i)?;
    if sign == '+' || sign == '-' {
        let unit = if sign == '+' { 1 } else { -1 };
        i += 1;
        match read_number(chars, &mut i) {
            Some(n) => charge = unit * n as i32,
            None => {
                charge = unit;
                while peek(i)? == sign {
                    charge += unit;
                    i += 1;
                }
            }
        }
    }

    if peek(i)? == ':' {
        i += 1;
        read_number(chars, &mut i);
    }

    match peek(i)? {
        ']' => Ok((
            Atom {
                element,
                aromatic,
                charge,
                isotope,
                hydrogens,
                bracket: true,
            },
            i + 1,
        )),
        ch => Err(SmilesError::UnexpectedChar { ch, pos: i }),
    }
}

fn read_number(chars: &[char], i: &mut usize) -> Option<u32> {
    let begin = *i;
    let mut value: u32 = 0;
    while let Some(d) = chars.get(*i).and_then(|c| c.to_digit(10)) {
        value = value.saturating_mul(10).saturating_add(d);
        *i += 1;
    }
    (*i > begin).then_some(value)
}

// ═══════════════════════════════════════════
// Fingerprints
// ═══════════════════════════════════════════

/// Fixed-width bit vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    words: Vec<u64>,
    bits: usize,
}

impl Fingerprint {
    pub fn new(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
            bits,
        }
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    fn set(&mut self, bit: usize) {
        self.words[bit / 64] |= 1 << (bit % 64);
    }

    pub fn is_set(&self, bit: usize) -> bool {
        bit < self.bits && self.words[bit / 64] & (1 << (bit % 64)) != 0
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Shared bits over bits set in either. Two empty fingerprints score 0.
    pub fn tanimoto(&self, other: &Fingerprint) -> f64 {
        let (mut both, mut either) = (0u32, 0u32);
        for (a, b) in self.words.iter().zip(&other.words) {
            both += (a & b).count_ones();
            either += (a | b).count_ones();
        }
        if either == 0 {
            0.0
        } else {
            f64::from(both) / f64::from(either)
        }
    }
}

fn stable_hash(bytes: &[u8]) -> u32 {
    let digest = Sha256::digest(bytes);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Circular fingerprint: each atom starts from its local invariants and
/// absorbs its neighbors' identifiers once per round. Every identifier from
/// every round sets one bit.
pub fn morgan_fingerprint(mol: &Molecule, radius: usize, bits: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(bits);
    if bits == 0 {
        return fp;
    }
    let in_ring = mol.ring_atoms();

    let mut ids: Vec<u32> = mol
        .atoms
        .iter()
        .enumerate()
        .map(|(i, atom)| {
            let mut buf = atom.element.as_bytes().to_vec();
            buf.push(0);
            push_u32(&mut buf, mol.degree(i) as u32);
            push_u32(&mut buf, atom.hydrogens);
            push_u32(&mut buf, atom.charge as u32);
            push_u32(&mut buf, atom.isotope.unwrap_or(0));
            push_u32(&mut buf, u32::from(in_ring[i]));
            stable_hash(&buf)
        })
        .collect();

    for id in &ids {
        fp.set(*id as usize % bits);
    }

    for round in 1..=radius {
        ids = (0..mol.atoms.len())
            .map(|i| {
                let mut env: Vec<(u32, u32)> = mol.neighbors[i]
                    .iter()
                    .map(|&(n, bond)| (mol.bonds[bond].order.code(), ids[n]))
                    .collect();
                env.sort_unstable();

                let mut buf = Vec::with_capacity(8 + env.len() * 8);
                push_u32(&mut buf, round as u32);
                push_u32(&mut buf, ids[i]);
                for (order, id) in env {
                    push_u32(&mut buf, order);
                    push_u32(&mut buf, id);
                }
                stable_hash(&buf)
            })
            .collect();

        for id in &ids {
            fp.set(*id as usize % bits);
        }
    }

    fp
}

/// Parse and fingerprint with the default radius and width.
pub fn fingerprint_smiles(smiles: &str) -> Result<Fingerprint, SmilesError> {
    let mol = parse_smiles(smiles)?;
    Ok(morgan_fingerprint(&mol, MORGAN_RADIUS, FINGERPRINT_BITS))
}
