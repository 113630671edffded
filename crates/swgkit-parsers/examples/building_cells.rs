/// Example listing the cells of a portal layout with their positions
///
/// This example decodes a `.pob` file, prints every cell with the position
/// reconstructed from portal hardpoints, and checks that re-encoding the
/// layout reproduces the file.

use std::path::PathBuf;

use swgkit_parsers::building;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        println!("Usage: cargo run --example building_cells -- <path-to-pob-file>");
        return Ok(());
    };

    let bytes = std::fs::read(&path)?;
    let layout = building::decode(&bytes)?;
    println!(
        "{}: version {}, {} portals, {} cells",
        path.display(),
        layout.version.tag(),
        layout.portals.len(),
        layout.cells.len()
    );

    let positions = layout.cell_positions();
    for (i, cell) in layout.cells.iter().enumerate() {
        match positions.get(&i) {
            Some(p) => println!("  {:>3} {:<24} ({:.2}, {:.2}, {:.2})", i, cell.name, p.x, p.y, p.z),
            None => println!("  {:>3} {:<24} unreachable", i, cell.name),
        }
    }

    if let Some(valid) = building::verify_checksum(&bytes)? {
        println!("Checksum: {}", if valid { "valid" } else { "mismatch" });
    }
    let identical = building::encode(&layout) == bytes;
    println!("Round trip: {}", if identical { "identical" } else { "differs" });
    Ok(())
}
