// cl_demo.rs -- demo block files
//
// A demo is a sequence of blocks: a little-endian length followed by one
// server message. A negative length marks a raw-deflate compressed block
// of that many bytes, and a length of -1 ends the demo.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use q2snap_common::common::{
    com_printf, msg_write_byte, msg_write_delta_entity, msg_write_long, msg_write_short,
    msg_write_string,
};
use q2snap_common::compression::{compress_block, decompress_block};
use q2snap_common::q_shared::{EntityState, CS_NAME, MAX_CONFIGSTRINGS};
use q2snap_common::qcommon::{
    SizeBuf, MAX_MSGLEN, SVC_CONFIGSTRING, SVC_SERVERDATA, SVC_SPAWNBASELINE, SVC_STUFFTEXT,
};

use crate::cl_parse::p_convert_config_string_to;
use crate::client::{ClientEntState, ClientState};

const DEMO_END: i32 = -1;

/// Appends message blocks to a demo stream.
pub struct DemoWriter {
    out: Box<dyn Write + Send>,
    compress: bool,
    blocks: u32,
}

impl DemoWriter {
    pub fn new(out: Box<dyn Write + Send>, compress: bool) -> Self {
        Self { out, compress, blocks: 0 }
    }

    pub fn create(path: &Path, compress: bool) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file)), compress))
    }

    pub fn compressed(&self) -> bool {
        self.compress
    }

    /// Number of message blocks written so far.
    pub fn blocks(&self) -> u32 {
        self.blocks
    }

    pub fn write_message(&mut self, data: &[u8]) -> io::Result<()> {
        if self.compress {
            if let Some(packed) = compress_block(data) {
                // a packed length of 1 would read back as the end marker
                debug_assert!(packed.len() > 1);
                self.out.write_all(&(-(packed.len() as i32)).to_le_bytes())?;
                self.out.write_all(&packed)?;
                self.blocks += 1;
                return Ok(());
            }
        }

        self.out.write_all(&(data.len() as i32).to_le_bytes())?;
        self.out.write_all(data)?;
        self.blocks += 1;
        Ok(())
    }

    /// Writes the end marker and flushes.
    pub fn finish(mut self) -> io::Result<()> {
        self.out.write_all(&DEMO_END.to_le_bytes())?;
        self.out.flush()
    }
}

/// Reads message blocks back, inflating compressed ones.
pub struct DemoReader<R: Read> {
    input: R,
    finished: bool,
}

impl<R: Read> DemoReader<R> {
    pub fn new(input: R) -> Self {
        Self { input, finished: false }
    }

    /// The next message, or `None` at the end marker or a clean end of
    /// stream.
    pub fn next_message(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }

        let mut len = [0u8; 4];
        match self.input.read_exact(&mut len) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.finished = true;
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
        let len = i32::from_le_bytes(len);

        if len == DEMO_END {
            self.finished = true;
            return Ok(None);
        }

        let size = len.unsigned_abs() as usize;
        if size > MAX_MSGLEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("demo block of {} bytes > MAX_MSGLEN", size),
            ));
        }

        let mut block = vec![0u8; size];
        self.input.read_exact(&mut block)?;

        if len < 0 {
            return decompress_block(&block, MAX_MSGLEN)
                .map(Some)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "corrupt compressed demo block"));
        }
        Ok(Some(block))
    }
}

impl<R: Read> Iterator for DemoReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message().transpose()
    }
}

/// In-memory demo sink that can be inspected while a writer holds a
/// clone.
#[derive(Debug, Clone, Default)]
pub struct DemoBuffer(Arc<Mutex<Vec<u8>>>);

impl DemoBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }
}

impl Write for DemoBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn flush_if_full(buf: &mut SizeBuf, needed: usize, demo: &mut DemoWriter) -> io::Result<()> {
    if buf.cursize as usize + needed > buf.maxsize as usize {
        demo.write_message(buf.as_slice())?;
        buf.clear();
    }
    Ok(())
}

/// Writes the messages a playback needs before the first recorded frame:
/// server data, every config string and every baseline.
pub fn cl_write_demo_header(
    demo: &mut DemoWriter,
    cl: &ClientState,
    ent_state: &ClientEntState,
    protocol: i32,
) -> io::Result<()> {
    let mut buf = SizeBuf::new(MAX_MSGLEN as i32);

    // send the serverdata
    msg_write_byte(&mut buf, SVC_SERVERDATA);
    msg_write_long(&mut buf, protocol);
    msg_write_long(&mut buf, cl.servercount.wrapping_add(0x10000));
    msg_write_byte(&mut buf, 1); // demos are always attract loops
    msg_write_string(&mut buf, &cl.gamedir);
    msg_write_short(&mut buf, cl.playernum);
    msg_write_string(&mut buf, &cl.configstrings[CS_NAME]);

    // configstrings
    for (i, cs) in cl.configstrings.iter().enumerate().take(MAX_CONFIGSTRINGS) {
        if cs.is_empty() {
            continue;
        }
        let wire = p_convert_config_string_to(i, protocol);
        if wire < 0 {
            com_printf(&format!("Demo header: configstring {} has no slot in protocol {}\n", i, protocol));
            continue;
        }
        flush_if_full(&mut buf, cs.len() + 32, demo)?;
        msg_write_byte(&mut buf, SVC_CONFIGSTRING);
        msg_write_short(&mut buf, wire);
        msg_write_string(&mut buf, cs);
    }

    // baselines
    let nullstate = EntityState::default();
    for ent in ent_state.cl_entities.iter() {
        if ent.baseline.modelindex == 0 {
            continue;
        }
        flush_if_full(&mut buf, 128, demo)?;
        msg_write_byte(&mut buf, SVC_SPAWNBASELINE);
        msg_write_delta_entity(&nullstate, &ent.baseline, &mut buf, true, true, protocol);
    }

    msg_write_byte(&mut buf, SVC_STUFFTEXT);
    msg_write_string(&mut buf, "precache\n");

    demo.write_message(buf.as_slice())
}
