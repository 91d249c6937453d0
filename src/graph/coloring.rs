use bitvec::slice::BitSlice;

use crate::environment::Subgraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Green,
    Blue,
    Grey,
    Black,
    Red,
    Yellow,
}

impl Color {
    pub fn hex(&self) -> &'static str {
        match self {
            Color::Green => "#00ff00",
            Color::Blue => "#0000ff",
            Color::Grey => "#808080",
            Color::Black => "#000000",
            Color::Red => "#ff0000",
            Color::Yellow => "#ffff00",
        }
    }
}

/// Colour of a canonical k-mer, decided when the graph is built.
/// Nodes of different colours are never merged.
pub type ColoringStrategy<'a> = Box<dyn Fn(&[u8]) -> Option<Color> + Send + Sync + 'a>;

/// Every k-mer is coloured after the environments containing it:
/// only `first` is green, only `second` is blue, both is grey and neither is black.
pub fn by_membership<'a>(first: &'a Subgraph, second: &'a Subgraph) -> ColoringStrategy<'a> {
    Box::new(
        move |kmer| match (first.contains(kmer), second.contains(kmer)) {
            (true, false) => Some(Color::Green),
            (false, true) => Some(Color::Blue),
            (true, true) => Some(Color::Grey),
            (false, false) => Some(Color::Black),
        },
    )
}

/// Colour of a node of a combined graph, from the set of environments it belongs to.
pub fn membership_color(mask: &BitSlice<u64>, is_seed: bool) -> String {
    if is_seed {
        return Color::Green.hex().to_string();
    }
    let nb_graphs = mask.len();
    let nb_members = mask.count_ones();
    match nb_graphs {
        2 => match nb_members {
            1 => Color::Red.hex().to_string(),
            2 => Color::Blue.hex().to_string(),
            _ => Color::Black.hex().to_string(),
        },
        3 => {
            let value: usize = mask.iter_ones().map(|i| 1 << i).sum();
            match value {
                1 => Color::Red.hex(),
                2 => Color::Blue.hex(),
                3 => "#ff00ff",
                4 => Color::Yellow.hex(),
                5 => "#ffaa00",
                6 => "#00ffff",
                _ => Color::Black.hex(),
            }
            .to_string()
        }
        _ => {
            let value = if nb_graphs == 0 {
                0
            } else {
                (256 * nb_members / nb_graphs).min(255)
            };
            format!("#{:02X}{:02X}{:02X}", value, value, value)
        }
    }
}
