//! Holds the atom/bond graph of a single record.
//!
//! A molecule is an undirected multigraph over its atoms. Bond identity is the position of the
//! bond in the bond list, assigned when the record is parsed, so two bonds with the same
//! endpoints and order never alias each other. The per-atom adjacency and the comparison depth
//! budget are derived lazily on first use and cached for the life of the molecule.

use serde::Serialize;
use std::cell::OnceCell;

pub type AtomIndex = usize;
pub type BondId = usize;

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Atom {
    pub element: String,
    pub x: f64,
    pub y: f64,
    /// Implicit hydrogen count, filled in by [`crate::hydrogen::hydrogenate`].
    pub hydrogens: u32,
}

impl Atom {

    pub fn new(element: &str, x: f64, y: f64) -> Self {

        return Self {
            element: element.to_string(),
            x,
            y,
            hydrogens: 0,
        }
    }

    pub fn is(&self, element: &str) -> bool {
        self.element == element
    }
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Bond {
    pub id: BondId,
    pub from: AtomIndex,
    pub to: AtomIndex,
    pub order: u8,
}

impl Bond {

    /// Atom reached by leaving `anchor` along this bond.
    ///
    /// Bonds are undirected, so either endpoint may be the anchor. An anchor that is not on the
    /// bond at all walks to `from`.
    pub fn other_end(&self, anchor: AtomIndex) -> AtomIndex {

        match self.from == anchor {
            true => self.to,
            false => self.from,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphCache {
    adjacency: Vec<Vec<BondId>>,
    depth_budget: i64,
}

impl GraphCache {

    fn build(atoms: &[Atom], bonds: &[Bond]) -> Self {

        let mut adjacency: Vec<Vec<BondId>> = vec![Vec::new(); atoms.len()];

        for bond in bonds.iter() {

            if let Some(list) = adjacency.get_mut(bond.from) {
                list.push(bond.id);
            }

            //a self-loop is declared once for its atom
            if bond.to != bond.from {
                if let Some(list) = adjacency.get_mut(bond.to) {
                    list.push(bond.id);
                }
            }
        }

        let depth_budget = 3 + (atoms.len() as f64).sqrt() as i64;

        return Self { adjacency, depth_budget };
    }
}

#[derive(Debug, Clone, Default)]
pub struct Molecule {
    pub name: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    hydrogenated: bool,
    cache: OnceCell<GraphCache>,
}

impl Molecule {

    pub fn new(name: &str) -> Self {

        return Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn add_atom(&mut self, atom: Atom) -> AtomIndex {

        self.atoms.push(atom);
        self.invalidate();

        return self.atoms.len() - 1;
    }

    /// Adds an undirected bond between two zero-based atom indices and returns its id.
    ///
    /// Indices are not checked against the atom list; dangling bonds are tolerated everywhere
    /// the graph is walked.
    pub fn add_bond(&mut self, from: AtomIndex, to: AtomIndex, order: u8) -> BondId {

        let id = self.bonds.len();
        self.bonds.push(Bond { id, from, to, order });
        self.invalidate();

        return id;
    }

    fn invalidate(&mut self) {
        self.cache.take();
        self.hydrogenated = false;
    }

    fn cache(&self) -> &GraphCache {
        self.cache.get_or_init(|| GraphCache::build(&self.atoms, &self.bonds))
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn atom(&self, index: AtomIndex) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn bond(&self, id: BondId) -> Option<&Bond> {
        self.bonds.get(id)
    }

    /// Ids of every bond declared on `atom`, in declaration order. Empty for unknown atoms.
    pub fn incident_bonds(&self, atom: AtomIndex) -> &[BondId] {

        match self.cache().adjacency.get(atom) {
            Some(list) => list,
            None => &[],
        }
    }

    pub fn degree(&self, atom: AtomIndex) -> usize {
        self.incident_bonds(atom).len()
    }

    /// Hop budget for branch comparison: `3 + floor(sqrt(atom_count))`.
    pub fn depth_budget(&self) -> i64 {
        self.cache().depth_budget
    }

    /// An explicit hydrogen atom that carries exactly one declared bond.
    pub fn is_terminal_hydrogen(&self, atom: AtomIndex) -> bool {

        match self.atoms.get(atom) {
            Some(a) => a.is("H") && self.degree(atom) == 1,
            None => false,
        }
    }

    pub fn is_hydrogenated(&self) -> bool {
        self.hydrogenated
    }

    /// Hydrogen counts may change without touching the graph, so the cache survives.
    pub(crate) fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub(crate) fn mark_hydrogenated(&mut self) {
        self.hydrogenated = true;
    }

    pub fn min_x(&self) -> f64 {
        self.atoms.iter().map(|a| a.x).fold(f64::INFINITY, f64::min)
    }

    pub fn max_x(&self) -> f64 {
        self.atoms.iter().map(|a| a.x).fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_y(&self) -> f64 {
        self.atoms.iter().map(|a| a.y).fold(f64::INFINITY, f64::min)
    }

    pub fn max_y(&self) -> f64 {
        self.atoms.iter().map(|a| a.y).fold(f64::NEG_INFINITY, f64::max)
    }
}
