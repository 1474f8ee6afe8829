use std::collections::{BTreeSet, HashSet};

/// An album as reported by the downloader, with the basenames it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub name: String,
    pub files: BTreeSet<String>,
}

/// Album name → member files, in the order the albums were listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumMembership {
    albums: Vec<Album>,
}

impl AlbumMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add files to an album, creating it at the end of the order if new.
    pub fn insert<I, S>(&mut self, name: &str, files: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = match self.albums.iter().position(|a| a.name == name) {
            Some(i) => i,
            None => {
                self.albums.push(Album {
                    name: name.to_string(),
                    files: BTreeSet::new(),
                });
                self.albums.len() - 1
            }
        };
        self.albums[index].files.extend(files.into_iter().map(Into::into));
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    /// Every file that belongs to at least one album.
    pub fn union(&self) -> HashSet<String> {
        self.albums
            .iter()
            .flat_map(|a| a.files.iter().cloned())
            .collect()
    }

    /// Total (album, file) pairs, counting a file once per album.
    pub fn pair_count(&self) -> usize {
        self.albums.iter().map(|a| a.files.len()).sum()
    }
}
