use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Result, Write},
    path::Path,
};

/// CBOR persistence for anything a retarget run reads or writes to disk.
pub trait Saveable
where
    Self: Sized,
{
    fn load<I: Read>(reader: I) -> Result<Self>;
    fn save<O: Write>(&self, writer: O) -> Result<()>;

    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(&path)?);
        self.save(&mut writer)?;
        writer.flush()
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        Self::load(BufReader::new(file))
    }
}
