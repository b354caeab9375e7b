use crate::source::has_breakpoint;

/// Addresses whose source line carries a breakpoint marker. Kept sorted.
#[derive(Clone, Default, Debug)]
pub struct Breakpoints(Vec<usize>);

impl Breakpoints {
    /// Collect breakpoints from the memory image, one line per address.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let addresses = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| has_breakpoint(line.as_ref()))
            .map(|(address, _)| address)
            .collect();
        Self(addresses)
    }

    pub fn contains(&self, address: usize) -> bool {
        self.0.binary_search(&address).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl<'a> IntoIterator for &'a Breakpoints {
    type Item = &'a usize;
    type IntoIter = std::slice::Iter<'a, usize>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_marked_lines() {
        let lines = ["LD GR0, 1I", "ADD GR0, 1I ;b", "", "BRA 0;b", "ST GR0, 0 ; b"];
        let breakpoints = Breakpoints::from_lines(&lines);
        assert_eq!(breakpoints.iter().collect::<Vec<_>>(), [1, 3]);
        assert!(breakpoints.contains(3));
        assert!(!breakpoints.contains(4));
        assert_eq!(breakpoints.len(), 2);
    }
}
