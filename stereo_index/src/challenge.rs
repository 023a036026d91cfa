//! Grid challenges built from a molecule's stereocenters.
//!
//! The molecule's 2D bounding box is cut into `cols x rows` cells labelled `A1`, `B1`, ... with
//! letters counting columns from the left and numbers counting rows from the top. The answer to a
//! challenge is the set of cells holding at least one stereocenter.

use crate::error::{Error, Result};
use crate::molecule::Molecule;
use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const ID_LENGTH: usize = 32;
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Columns and rows for `n` targets: `ceil(sqrt(n))` columns and enough rows to hold `n` cells.
pub fn auto_grid(n: usize) -> (usize, usize) {

    let n = n.max(1);
    let cols = (n as f64).sqrt().ceil() as usize;
    let rows = (n + cols - 1) / cols;

    return (cols, rows);
}

/// Spreadsheet-style column name: A..Z, then AA, AB, ...
fn column_name(col: usize) -> String {

    let mut name: Vec<u8> = Vec::new();
    let mut n = col + 1;

    while n > 0 {
        n -= 1;
        name.push(b'A' + (n % 26) as u8);
        n /= 26;
    }

    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

pub fn cell_label(col: usize, row: usize) -> String {
    format!("{}{}", column_name(col), row + 1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub cols: usize,
    pub rows: usize,
    min_x: f64,
    max_y: f64,
    cell_width: f64,
    cell_height: f64,
}

impl Grid {

    /// Lays a grid over the bounding box of `mol`. A flat box (all atoms on one line) gets a unit
    /// extent along the flat axis.
    pub fn over(mol: &Molecule, cols: usize, rows: usize) -> Result<Self> {

        if mol.atom_count() == 0 {
            return Err(Error::Geometry("molecule has no atoms"));
        }

        if cols == 0 || rows == 0 {
            return Err(Error::Geometry("grid needs at least one cell"));
        }

        let (min_x, max_x, min_y, max_y) = (mol.min_x(), mol.max_x(), mol.min_y(), mol.max_y());

        if !(min_x.is_finite() && max_x.is_finite() && min_y.is_finite() && max_y.is_finite()) {
            return Err(Error::Geometry("non-finite coordinates"));
        }

        let width = match max_x - min_x > 0.0 {
            true => max_x - min_x,
            false => 1.0,
        };

        let height = match max_y - min_y > 0.0 {
            true => max_y - min_y,
            false => 1.0,
        };

        return Ok(Self {
            cols,
            rows,
            min_x,
            max_y,
            cell_width: width / cols as f64,
            cell_height: height / rows as f64,
        })
    }

    /// Cell holding the point, clamped so points on the far edges land in the last column or row.
    pub fn cell_of(&self, x: f64, y: f64) -> (usize, usize) {

        let col = ((x - self.min_x) / self.cell_width).floor().max(0.0) as usize;
        let row = ((self.max_y - y) / self.cell_height).floor().max(0.0) as usize;

        (col.min(self.cols - 1), row.min(self.rows - 1))
    }

    pub fn label_of(&self, x: f64, y: f64) -> String {
        let (col, row) = self.cell_of(x, y);
        cell_label(col, row)
    }

    /// Every label, row by row from the top.
    pub fn labels(&self) -> Vec<String> {

        let mut labels = Vec::with_capacity(self.cols * self.rows);

        for row in 0..self.rows {
            for col in 0..self.cols {
                labels.push(cell_label(col, row));
            }
        }

        return labels;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Challenge {
    pub regions: Vec<String>,
    pub answers: Vec<String>,
}

impl Challenge {

    /// Builds the challenge for `mol` given its one-based stereocenter indices.
    pub fn new(mol: &Molecule, centers: &[usize]) -> Result<Self> {

        let (cols, rows) = auto_grid(centers.len());
        let grid = Grid::over(mol, cols, rows)?;

        let mut answers: BTreeSet<String> = BTreeSet::new();
        for center in centers.iter() {

            let atom = center
                .checked_sub(1)
                .and_then(|i| mol.atom(i))
                .ok_or(Error::Geometry("stereocenter index out of range"))?;

            answers.insert(grid.label_of(atom.x, atom.y));
        }

        return Ok(Self {
            regions: grid.labels(),
            answers: answers.into_iter().collect(),
        })
    }

    /// True when the selection names every answer cell and nothing else.
    pub fn verify(&self, selections: &[String]) -> bool {

        if selections.len() != self.answers.len() {
            return false;
        }

        selections.iter().all(|s| self.answers.binary_search(s).is_ok())
    }
}

pub fn random_id() -> String {

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug)]
struct Entry {
    created: Instant,
    challenge: Challenge,
}

/// Live challenges keyed by id. Entries older than the TTL are dropped on every insert and never
/// returned.
#[derive(Debug)]
pub struct ChallengeStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for ChallengeStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ChallengeStore {

    pub fn new(ttl: Duration) -> Self {

        return Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, challenge: Challenge) -> String {

        let id = random_id();
        let now = Instant::now();
        let ttl = self.ttl;

        let mut entries = self.lock();

        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.created) < ttl);
        if entries.len() < before {
            debug!("evicted {} expired challenges", before - entries.len());
        }

        entries.insert(id.clone(), Entry { created: now, challenge });

        return id;
    }

    pub fn get(&self, id: &str) -> Option<Challenge> {

        let entries = self.lock();

        match entries.get(id) {
            Some(entry) if entry.created.elapsed() < self.ttl => Some(entry.challenge.clone()),
            _ => None,
        }
    }

    /// `None` when the id is unknown or expired.
    pub fn verify(&self, id: &str, selections: &[String]) -> Option<bool> {
        self.get(id).map(|challenge| challenge.verify(selections))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::chiral::chiral_centers;
    use crate::fixtures;

    fn strings(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn grid_shapes() {

        assert_eq!(auto_grid(0), (1, 1));
        assert_eq!(auto_grid(1), (1, 1));
        assert_eq!(auto_grid(3), (2, 2));
        assert_eq!(auto_grid(4), (2, 2));
        assert_eq!(auto_grid(5), (3, 2));
        assert_eq!(auto_grid(10), (4, 3));
    }

    #[test]
    fn labels_run_past_z() {

        assert_eq!(cell_label(0, 0), "A1");
        assert_eq!(cell_label(25, 2), "Z3");
        assert_eq!(cell_label(26, 0), "AA1");
        assert_eq!(cell_label(27, 9), "AB10");
    }

    #[test]
    fn rows_count_from_the_top() {

        let mut mol = Molecule::new("square");
        for (x, y) in [(0.0, 0.0), (2.0, 0.0), (0.0, 2.0), (2.0, 2.0)] {
            mol.add_atom(crate::molecule::Atom::new("C", x, y));
        }

        let grid = Grid::over(&mol, 2, 2).unwrap();

        assert_eq!(grid.label_of(0.0, 2.0), "A1");
        assert_eq!(grid.label_of(2.0, 2.0), "B1");
        assert_eq!(grid.label_of(0.0, 0.0), "A2");
        assert_eq!(grid.label_of(2.0, 0.0), "B2");
        assert_eq!(grid.labels(), strings(&["A1", "B1", "A2", "B2"]));
    }

    #[test]
    fn flat_molecule_still_gets_a_grid() {

        let mut mol = Molecule::new("line");
        mol.add_atom(crate::molecule::Atom::new("C", 0.0, 1.0));
        mol.add_atom(crate::molecule::Atom::new("C", 3.0, 1.0));

        let grid = Grid::over(&mol, 2, 1).unwrap();

        assert_eq!(grid.label_of(0.0, 1.0), "A1");
        assert_eq!(grid.label_of(3.0, 1.0), "B1");
        assert!(matches!(Grid::over(&Molecule::new("empty"), 1, 1), Err(Error::Geometry(_))));
    }

    #[test]
    fn challenge_answers_are_sorted_and_unique() {

        let mut mol = fixtures::trichiral_chain();
        let centers = chiral_centers(&mut mol);
        let challenge = Challenge::new(&mol, &centers).unwrap();

        //centers sit at x = 1, 2, 3 over a 0..5 by -1..1.5 box cut 2 x 2
        assert_eq!(challenge.regions, strings(&["A1", "B1", "A2", "B2"]));
        assert_eq!(challenge.answers, strings(&["A1", "A2", "B1"]));

        assert!(challenge.verify(&strings(&["B1", "A1", "A2"])));
        assert!(!challenge.verify(&strings(&["A1", "A2"])));
        assert!(!challenge.verify(&strings(&["A1", "A2", "B2"])));
        assert!(!challenge.verify(&strings(&["A1", "A1", "A2", "B1"])));
    }

    #[test]
    fn bad_center_index_is_rejected() {

        let mol = fixtures::trichiral_chain();

        assert!(Challenge::new(&mol, &[0]).is_err());
        assert!(Challenge::new(&mol, &[42]).is_err());
    }

    #[test]
    fn ids_are_alphanumeric() {

        let id = random_id();

        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, random_id());
    }

    #[test]
    fn store_round_trip_and_expiry() {

        let challenge = Challenge { regions: strings(&["A1", "B1"]), answers: strings(&["B1"]) };

        let store = ChallengeStore::default();
        let id = store.insert(challenge.clone());

        assert_eq!(store.get(&id), Some(challenge.clone()));
        assert_eq!(store.verify(&id, &strings(&["B1"])), Some(true));
        assert_eq!(store.verify(&id, &strings(&["A1"])), Some(false));
        assert_eq!(store.verify("unknown", &strings(&["B1"])), None);

        let expired = ChallengeStore::new(Duration::ZERO);
        let first = expired.insert(challenge.clone());
        assert_eq!(expired.get(&first), None);

        expired.insert(challenge);
        assert_eq!(expired.len(), 1);
    }
}
