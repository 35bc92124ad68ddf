/// How [`AsyncFile::open`](super::AsyncFile::open) opens a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    read: bool,
    write: bool,
    create: bool,
    truncate: bool,
    append: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only access to an existing file.
    pub fn reading() -> Self {
        Self::new().read(true)
    }

    /// Write access to a created-or-truncated file.
    pub fn overwriting() -> Self {
        Self::new().write(true).create(true).truncate(true)
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Starts the write position at the current end of the file.
    ///
    /// The file is not opened in OS append mode: writes stay positional, so
    /// [`AsyncFile::set_position`](super::AsyncFile::set_position) and
    /// [`AsyncFile::reset`](super::AsyncFile::reset) keep working.
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub(crate) fn is_append(&self) -> bool {
        self.append
    }

    pub(crate) fn to_std(self) -> std::fs::OpenOptions {
        let mut options = std::fs::OpenOptions::new();
        options.read(self.read).write(self.write || self.append).create(self.create).truncate(self.truncate);
        options
    }
}
