// cl_main.rs -- client protocol state and message intake
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2 or later.

use std::path::Path;

use q2snap_common::common::{com_dprintf, com_printf, com_set_developer};
use q2snap_common::cvar::{CvarContext, CVAR_ARCHIVE};
use q2snap_common::net_queue::MessageQueue;
use q2snap_common::qcommon::SizeBuf;

use crate::cl_demo::{cl_write_demo_header, DemoWriter};
use crate::cl_parse::{cl_parse_server_message, cl_prep_refresh, cl_register_sounds};
use crate::client::*;
use crate::error::{ParseError, ParseResult};

/// Construction parameters that are not cvars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Entity states kept for delta decoding. Rounded up to a power of two.
    pub pool_capacity: usize,
    /// A delta base within this many entries of being overwritten is stale.
    pub pool_margin: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool_capacity: MAX_PARSE_ENTITIES,
            pool_margin: PARSE_ENTITIES_MARGIN,
        }
    }
}

/// CL_ClearState -- wipe everything that belongs to the current level.
pub fn cl_clear_state(cl: &mut ClientState, ent_state: &mut ClientEntState) {
    // wipe the entire cl structure
    *cl = ClientState::new();
    ent_state.clear();
}

/// One server connection: everything the decoder reads and writes.
pub struct ClientProtocolState {
    pub cl: ClientState,
    pub cls: ClientStatic,
    pub ent_state: ClientEntState,
    pub cvars: CvarContext,
    pub stats: ParseStats,
}

impl ClientProtocolState {
    pub fn new(config: ClientConfig) -> Self {
        let capacity = config.pool_capacity.max(1).next_power_of_two();
        let margin = config.pool_margin.min(capacity - 1);

        let mut cvars = CvarContext::new();
        cvars.get("developer", "0", 0);
        cvars.get("cl_shownet", "0", 0);
        cvars.get("cl_predict", "1", 0);
        cvars.get("cl_noskins", "0", 0);
        cvars.get("cl_vwep", "1", CVAR_ARCHIVE);
        cvars.get("cl_demo_compress", "0", CVAR_ARCHIVE);

        Self {
            cl: ClientState::new(),
            cls: ClientStatic::default(),
            ent_state: ClientEntState::new(capacity, margin),
            cvars,
            stats: ParseStats::default(),
        }
    }

    /// Samples the cvars the parser reads. Called once per message.
    pub fn settings(&self) -> ParseSettings {
        com_set_developer(self.cvars.variable_value("developer") != 0.0);
        ParseSettings {
            shownet: self.cvars.variable_value("cl_shownet") as i32,
            predict: self.cvars.variable_value("cl_predict") != 0.0,
            noskins: self.cvars.variable_value("cl_noskins") != 0.0,
            vwep: self.cvars.variable_value("cl_vwep") != 0.0,
        }
    }

    /// The transport has a channel to the server; svc_serverdata is next.
    pub fn cl_client_connect(&mut self) {
        if self.cls.state == ConnState::Connected {
            com_printf("Dup connect received.  Ignored.\n");
            return;
        }
        self.cls.state = ConnState::Connected;
    }

    /// Parses one complete server message. Any error drops the connection
    /// before it is returned.
    pub fn cl_parse_message(&mut self, data: &[u8], callbacks: &mut dyn ClientCallbacks) -> ParseResult<()> {
        let settings = self.settings();
        let mut net_message = SizeBuf::from_message(data);
        self.stats.messages += 1;

        let result = {
            let mut ctx = ParseContext {
                cl: &mut self.cl,
                cls: &mut self.cls,
                ent_state: &mut self.ent_state,
                stats: &mut self.stats,
                settings,
                callbacks: &mut *callbacks,
            };
            cl_parse_server_message(&mut ctx, &mut net_message)
        };

        if let Err(e) = &result {
            match e {
                ParseError::ServerDisconnected => com_printf("Server disconnected\n"),
                _ => com_printf(&format!("ERROR: CL_ParseServerMessage: {}\n", e)),
            }
            self.cl_drop(callbacks);
        }

        result
    }

    /// CL_ReadPackets -- Drains the queue in order. Messages that arrive
    /// while not connected are dumped. Stops at the first message that
    /// drops the connection.
    pub fn cl_read_packets(&mut self, queue: &MessageQueue, callbacks: &mut dyn ClientCallbacks) -> ParseResult<usize> {
        let mut parsed = 0;
        while let Some(message) = queue.try_recv() {
            if self.cls.state < ConnState::Connected {
                com_dprintf(&format!("Dumping message {} while not connected\n", message.sequence));
                continue; // dump it if not connected
            }
            self.cl_parse_message(&message.data, callbacks)?;
            parsed += 1;
        }
        Ok(parsed)
    }

    /// CL_Drop -- Called after an error was printed.
    pub fn cl_drop(&mut self, callbacks: &mut dyn ClientCallbacks) {
        if self.cls.state <= ConnState::Disconnected {
            return;
        }

        self.cl_disconnect();

        // drop loading plaque unless this is the initial game start
        if self.cls.disable_servercount != -1 {
            callbacks.scr_end_loading_plaque();
        }
    }

    /// CL_Disconnect -- Goes from a connected state to full screen console
    /// state.
    pub fn cl_disconnect(&mut self) {
        if self.cls.state == ConnState::Disconnected {
            return;
        }

        // stop demo recording
        if self.cls.demo_recording() {
            self.cl_stop();
        }

        cl_clear_state(&mut self.cl, &mut self.ent_state);
        self.cls.state = ConnState::Disconnected;
        self.cls.download_percent = 0;
    }

    pub fn cl_prep_refresh(&mut self, callbacks: &mut dyn ClientCallbacks) {
        let settings = self.settings();
        cl_prep_refresh(&mut self.cl, &settings, callbacks);
    }

    pub fn cl_register_sounds(&mut self, callbacks: &mut dyn ClientCallbacks) {
        cl_register_sounds(&mut self.cl, callbacks);
    }

    /// CL_Record_f -- Begins recording a demo from the current position.
    pub fn cl_record(&mut self, path: &Path) -> bool {
        let compress = self.cvars.variable_value("cl_demo_compress") != 0.0;
        match DemoWriter::create(path, compress) {
            Ok(demo) => {
                com_printf(&format!("recording to {}.\n", path.display()));
                self.cl_start_recording(demo)
            }
            Err(e) => {
                com_printf(&format!("ERROR: couldn't open {}: {}\n", path.display(), e));
                false
            }
        }
    }

    /// Starts recording into an already opened demo. The header carries the
    /// current config strings and baselines; frames follow once a full
    /// frame arrives.
    pub fn cl_start_recording(&mut self, mut demo: DemoWriter) -> bool {
        if self.cls.demo_recording() {
            com_printf("Already recording.\n");
            return false;
        }
        if self.cls.state != ConnState::Active {
            com_printf("You must be in a level to record.\n");
            return false;
        }

        // write out messages to hold the startup information
        if let Err(e) = cl_write_demo_header(&mut demo, &self.cl, &self.ent_state, self.cls.server_protocol) {
            com_printf(&format!("ERROR: demo header: {}\n", e));
            return false;
        }

        // don't start saving messages until a non-delta compressed message
        // is received
        self.cls.demo_waiting = true;
        self.cls.demo = Some(demo);
        true
    }

    /// CL_Stop_f -- stop recording a demo
    pub fn cl_stop(&mut self) {
        let Some(demo) = self.cls.demo.take() else {
            com_printf("Not recording a demo.\n");
            return;
        };

        // finish up
        if let Err(e) = demo.finish() {
            com_printf(&format!("ERROR: finishing demo: {}\n", e));
        }
        self.cls.demo_waiting = false;
        com_printf("Stopped demo.\n");
    }
}

impl Default for ClientProtocolState {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
