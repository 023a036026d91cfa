//! Implicit hydrogen assignment from declared bond orders.

use crate::molecule::Molecule;

/// Standard valence used to infer implicit hydrogens, or `None` when the element keeps whatever
/// count it already carries.
pub fn standard_valence(element: &str) -> Option<u32> {

    match element {
        "C" => Some(4),
        "N" | "P" => Some(3),
        "O" | "S" => Some(2),
        _ => None,
    }
}

/// Sets every atom's implicit hydrogen count to `max(0, valence - sum of incident bond orders)`.
///
/// The count is recomputed from the current bonds each time, never accumulated, so calling this
/// more than once gives the same result. Elements without a standard valence are left untouched.
pub fn hydrogenate(mol: &mut Molecule) {

    let bond_sums: Vec<u32> = (0..mol.atom_count())
        .map(|atom| {
            mol.incident_bonds(atom)
                .iter()
                .filter_map(|id| mol.bond(*id))
                .map(|bond| bond.order as u32)
                .sum()
        })
        .collect();

    for (atom, total) in mol.atoms_mut().iter_mut().zip(bond_sums.into_iter()) {

        if let Some(valence) = standard_valence(&atom.element) {
            atom.hydrogens = valence.saturating_sub(total);
        }
    }

    mol.mark_hydrogenated();
}

/// Runs [`hydrogenate`] unless it already ran since the graph last changed.
pub fn ensure_hydrogenated(mol: &mut Molecule) {

    match mol.is_hydrogenated() {
        true => {},
        false => hydrogenate(mol),
    }
}
