//! Stereocenter detection by branch comparison.
//!
//! A carbon is reported as a stereocenter when it has four distinct substituents, either four
//! heavy branches with no hydrogen or three heavy branches plus one hydrogen, and no two of its
//! heavy branches compare equal. Branches are compared by walking outward from the center in
//! lockstep, checking bond order, element, hydrogen count and substituent count at every hop.
//!
//! The walk is bounded three ways:
//! - a hop budget of `3 + floor(sqrt(atom_count))`; past it the branches are assumed equal,
//! - a visited set of `(atom_a, atom_b, bond_a, bond_b)` tuples per top-level comparison, so
//!   re-entering a ring resolves to "equal" instead of recursing forever,
//! - an optional [`CancelToken`] polled on every step.
//!
//! Substituent matching is not one-to-one: each substituent on one side only needs
//! *some* equal substituent on the other side, and a substituent may be reused. This is a
//! heuristic, not a CIP assignment, and it can call highly symmetric branches equal.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::hydrogen::ensure_hydrogenated;
use crate::molecule::{AtomIndex, BondId, Molecule};
use std::collections::HashSet;

/// How often the deadline clock is read during a comparison.
const CLOCK_STRIDE: u64 = 64;

/// Heavy substituents of `atom`, ignoring `skip`, plus its total hydrogen count.
#[derive(Debug, PartialEq)]
struct Environment {
    hydrogens: u32,
    heavy_bonds: Vec<BondId>,
}

fn environment(mol: &Molecule, atom: AtomIndex, skip: Option<BondId>) -> Environment {

    let mut hydrogens = mol.atom(atom).map(|a| a.hydrogens).unwrap_or(0);
    let mut heavy_bonds: Vec<BondId> = Vec::new();

    for id in mol.incident_bonds(atom).iter() {

        if Some(*id) == skip {
            continue;
        }

        let bond = match mol.bond(*id) {
            Some(bond) => bond,
            None => continue,
        };

        match mol.is_terminal_hydrogen(bond.other_end(atom)) {
            true => hydrogens += 1,
            false => heavy_bonds.push(*id),
        }
    }

    return Environment { hydrogens, heavy_bonds };
}

/// Compares branches for one candidate center. Holds the state of a single top-level comparison.
struct BranchComparer<'a> {
    mol: &'a Molecule,
    token: &'a CancelToken,
    visited: HashSet<(AtomIndex, AtomIndex, BondId, BondId)>,
    steps: u64,
}

impl<'a> BranchComparer<'a> {

    fn new(mol: &'a Molecule, token: &'a CancelToken) -> Self {

        return Self {
            mol,
            token,
            visited: HashSet::new(),
            steps: 0,
        }
    }

    fn tick(&mut self) -> Result<()> {

        if self.steps % CLOCK_STRIDE == 0 {
            self.token.check()?;
        }
        self.steps += 1;

        Ok(())
    }

    fn equivalent(&mut self, anchor_a: AtomIndex, anchor_b: AtomIndex, bond_a: BondId, bond_b: BondId, depth: i64) -> Result<bool> {

        self.tick()?;

        //a branch that runs out never causes a mismatch by itself
        let (first, second) = match (self.mol.bond(bond_a), self.mol.bond(bond_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(true),
        };

        if depth < 0 {
            return Ok(true);
        }

        if !self.visited.insert((anchor_a, anchor_b, bond_a, bond_b)) {
            return Ok(true);
        }

        if first.order != second.order {
            return Ok(false);
        }

        let next_a = first.other_end(anchor_a);
        let next_b = second.other_end(anchor_b);

        let (atom_a, atom_b) = match (self.mol.atom(next_a), self.mol.atom(next_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(true),
        };

        if atom_a.element != atom_b.element {
            return Ok(false);
        }

        let env_a = environment(self.mol, next_a, Some(bond_a));
        let env_b = environment(self.mol, next_b, Some(bond_b));

        if env_a.hydrogens != env_b.hydrogens || env_a.heavy_bonds.len() != env_b.heavy_bonds.len() {
            return Ok(false);
        }

        if env_a.heavy_bonds.is_empty() {
            return Ok(true);
        }

        let depth = depth - 1;

        for sub_a in env_a.heavy_bonds.iter() {

            let mut matched = false;

            for sub_b in env_b.heavy_bonds.iter() {
                if self.equivalent(next_a, next_b, *sub_a, *sub_b, depth)? {
                    matched = true;
                    break;
                }
            }

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Whether the branches leaving `center` along `bond_a` and `bond_b` look the same.
///
/// Indices are zero-based. Unknown bond ids compare as equal.
pub fn compare_branches(mol: &Molecule, center: AtomIndex, bond_a: BondId, bond_b: BondId) -> bool {

    let token = CancelToken::new();
    compare_branches_with(mol, center, bond_a, bond_b, &token).unwrap_or(true)
}

pub fn compare_branches_with(mol: &Molecule, center: AtomIndex, bond_a: BondId, bond_b: BondId, token: &CancelToken) -> Result<bool> {

    let mut comparer = BranchComparer::new(mol, token);
    comparer.equivalent(center, center, bond_a, bond_b, mol.depth_budget())
}

fn is_chiral_carbon_with(mol: &Molecule, atom: AtomIndex, token: &CancelToken) -> Result<bool> {

    match mol.atom(atom) {
        Some(a) if a.is("C") => {},
        _ => return Ok(false),
    }

    let env = environment(mol, atom, None);

    match (env.heavy_bonds.len(), env.hydrogens) {
        (4, 0) | (3, 1) => {},
        _ => return Ok(false),
    }

    let branches = &env.heavy_bonds;

    for i in 0..branches.len() {
        for j in (i + 1)..branches.len() {
            if compare_branches_with(mol, atom, branches[i], branches[j], token)? {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// Whether the atom at zero-based `atom` is a stereocenter. Expects a hydrogenated molecule.
pub fn is_chiral_carbon(mol: &Molecule, atom: AtomIndex) -> bool {

    let token = CancelToken::new();
    is_chiral_carbon_with(mol, atom, &token).unwrap_or(false)
}

/// One-based indices of every stereocenter, in ascending order.
///
/// Hydrogenates the molecule first if that has not happened yet.
pub fn chiral_centers(mol: &mut Molecule) -> Vec<usize> {

    let token = CancelToken::new();
    chiral_centers_with(mol, &token).unwrap_or_default()
}

/// Cancellable form of [`chiral_centers`]; returns [`crate::error::Error::Cancelled`] once the
/// token trips.
pub fn chiral_centers_with(mol: &mut Molecule, token: &CancelToken) -> Result<Vec<usize>> {

    ensure_hydrogenated(mol);

    let mut centers: Vec<usize> = Vec::new();

    for atom in 0..mol.atom_count() {

        token.check()?;

        if is_chiral_carbon_with(mol, atom, token)? {
            centers.push(atom + 1);
        }
    }

    Ok(centers)
}
