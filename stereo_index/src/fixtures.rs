//! Small hand-built molecules and record files shared by the unit tests.

use crate::layout::RECORD_TERMINATOR;
use crate::molecule::{Atom, Molecule};
use crate::sdf::write_mol_block;
use std::io::Write;
use std::path::Path;

fn build(name: &str, atoms: &[(&str, f64, f64)], bonds: &[(usize, usize, u8)]) -> Molecule {

    let mut mol = Molecule::new(name);

    for (element, x, y) in atoms.iter() {
        mol.add_atom(Atom::new(element, *x, *y));
    }

    for (from, to, order) in bonds.iter() {
        mol.add_bond(*from, *to, *order);
    }

    return mol;
}

/// CFClBr-CH3: one center, atom 1.
pub fn bromochlorofluoroethane() -> Molecule {

    build(
        "1-bromo-1-chloro-1-fluoroethane",
        &[("C", 0.0, 0.0), ("F", 0.0, 1.0), ("Cl", 1.0, 0.0), ("Br", 0.0, -1.0), ("C", -1.0, 0.0)],
        &[(0, 1, 1), (0, 2, 1), (0, 3, 1), (0, 4, 1)],
    )
}

/// C(CH2CH3)2FCl: the center carries two identical ethyl groups.
pub fn diethyl_center() -> Molecule {

    build(
        "3-chloro-3-fluoropentane",
        &[
            ("C", 0.0, 0.0),
            ("C", 1.0, 0.0),
            ("C", 2.0, 0.5),
            ("C", -1.0, 0.0),
            ("C", -2.0, 0.5),
            ("F", 0.0, 1.0),
            ("Cl", 0.0, -1.0),
        ],
        &[(0, 1, 1), (1, 2, 1), (0, 3, 1), (3, 4, 1), (0, 5, 1), (0, 6, 1)],
    )
}

/// CH3-CHF-CHCl-CHBr-CH2-CH3: centers at atoms 2, 4 and 6.
pub fn trichiral_chain() -> Molecule {

    build(
        "4-bromo-3-chloro-2-fluorohexane",
        &[
            ("C", 0.0, 0.0),
            ("C", 1.0, 0.5),
            ("F", 1.0, 1.5),
            ("C", 2.0, 0.0),
            ("Cl", 2.0, -1.0),
            ("C", 3.0, 0.5),
            ("Br", 3.0, 1.5),
            ("C", 4.0, 0.0),
            ("C", 5.0, 0.5),
        ],
        &[(0, 1, 1), (1, 2, 1), (1, 3, 1), (3, 4, 1), (3, 5, 1), (5, 6, 1), (5, 7, 1), (7, 8, 1)],
    )
}

/// CHFClBr with the hydrogen drawn as its own atom.
pub fn explicit_hydrogen_center() -> Molecule {

    build(
        "bromochlorofluoromethane",
        &[("C", 0.0, 0.0), ("F", 0.0, 1.0), ("Cl", 1.0, 0.0), ("Br", 0.0, -1.0), ("H", -1.0, 0.0)],
        &[(0, 1, 1), (0, 2, 1), (0, 3, 1), (0, 4, 1)],
    )
}

/// Ring of `size` carbons with a methyl on atom 1.
pub fn substituted_ring(size: usize) -> Molecule {

    let mut mol = Molecule::new("methylcycloalkane");

    for i in 0..size {
        let angle = i as f64 / size as f64 * std::f64::consts::TAU;
        mol.add_atom(Atom::new("C", angle.cos(), angle.sin()));
    }

    for i in 0..size {
        mol.add_bond(i, (i + 1) % size, 1);
    }

    let methyl = mol.add_atom(Atom::new("C", 2.0, 0.0));
    mol.add_bond(0, methyl, 1);

    return mol;
}

pub fn methylcyclohexane() -> Molecule {
    substituted_ring(6)
}

/// 1-fluoro-3-methylcyclohexane: centers at atoms 1 and 3.
pub fn fluoro_methyl_cyclohexane() -> Molecule {

    let mut mol = substituted_ring(6);
    mol.name = "1-fluoro-3-methylcyclohexane".to_string();

    //move the methyl from atom 1 to atom 3 and put a fluorine on atom 1
    let mut moved = Molecule::new(&mol.name);
    for atom in mol.atoms().iter() {
        moved.add_atom(atom.clone());
    }
    for bond in mol.bonds().iter().take(6) {
        moved.add_bond(bond.from, bond.to, bond.order);
    }
    moved.add_bond(2, 6, 1);
    let f = moved.add_atom(Atom::new("F", 1.5, 0.5));
    moved.add_bond(0, f, 1);

    return moved;
}

/// Three records with at least three centers and two without.
pub fn mixed_records() -> Vec<(Molecule, bool)> {

    vec![
        (trichiral_chain(), true),
        (bromochlorofluoroethane(), false),
        (trichiral_chain(), true),
        (diethyl_center(), false),
        (trichiral_chain(), true),
    ]
}

/// Writes the molecules as one record file and returns the start offset of every record.
pub fn write_records(path: &Path, mols: &[Molecule]) -> Vec<u64> {

    let mut file = std::fs::File::create(path).unwrap();
    let mut offsets: Vec<u64> = Vec::new();
    let mut position: u64 = 0;

    for mol in mols.iter() {

        offsets.push(position);

        let text = format!("{}{}\n", write_mol_block(mol), RECORD_TERMINATOR);
        file.write_all(text.as_bytes()).unwrap();
        position += text.len() as u64;
    }

    return offsets;
}
