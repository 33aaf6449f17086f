// client.rs -- client-side state filled in by the message parser

use rayon::prelude::*;

use q2snap_common::q_shared::{
    EntityState, PlayerState, Vec3, MAX_CLIENTS, MAX_CONFIGSTRINGS, MAX_EDICTS,
    MAX_IMAGES, MAX_ITEMS, MAX_MAP_AREAS, MAX_MODELS, MAX_QPATH, MAX_SOUNDS,
};
use q2snap_common::qcommon::UPDATE_BACKUP;

use crate::cl_demo::DemoWriter;
use crate::cl_ring::{EntityPool, Ring};
use crate::cl_tent::TempEntity;

pub const MAX_CLIENTWEAPONMODELS: usize = 20;

/// Default size of the entity pool, in entity states.
pub const MAX_PARSE_ENTITIES: usize = 16384;
/// A delta base this close to being overwritten is treated as too old.
pub const PARSE_ENTITIES_MARGIN: usize = 128;

// ============================================================
// frame_t
// ============================================================

#[derive(Debug, Clone)]
pub struct Frame {
    pub valid: bool,               // cleared if delta parsing was invalid
    pub serverframe: i32,
    pub servertime: i32,           // server time the message is valid for (in msec)
    pub deltaframe: i32,
    pub areabits: [u8; MAX_MAP_AREAS / 8], // portalarea visibility bits
    pub playerstate: PlayerState,
    pub origin: [i32; 3],          // player origin, 1/8 units
    pub num_entities: i32,
    pub parse_entities: i32,       // non-masked index into the entity pool
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            valid: false,
            serverframe: 0,
            servertime: 0,
            deltaframe: 0,
            areabits: [0u8; MAX_MAP_AREAS / 8],
            playerstate: PlayerState::default(),
            origin: [0; 3],
            num_entities: 0,
            parse_entities: 0,
        }
    }
}

// ============================================================
// centity_t
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct CEntity {
    pub baseline: EntityState,     // delta from this if not from a previous frame
    pub current: EntityState,
    pub prev: EntityState,         // will always be valid, but might just be a copy of current
    pub serverframe: i32,          // if not current, this ent isn't in the frame
    pub trailcount: i32,           // for diminishing grenade trails
    pub lerp_origin: Vec3,         // for trails (variable hz)
}

// ============================================================
// clientinfo_t
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub name: String,
    pub cinfo: String,
    pub skin: i32,                 // image index
    pub icon: i32,                 // image index
    pub iconname: String,
    pub model: i32,                // model index
    pub weaponmodel: [i32; MAX_CLIENTWEAPONMODELS], // model indices
}

// ============================================================
// client_state_t
//
// Wiped completely at every server map change.
// ============================================================

pub struct ClientState {
    pub refresh_prepped: bool,     // false if on new level or new ref dll
    pub sound_prepped: bool,       // ambient sounds can start
    pub force_refdef: bool,        // vid has changed, so we can't use a paused refdef

    pub predicted_origin: Vec3,    // generated by prediction
    pub predicted_angles: Vec3,

    pub frame: Frame,              // received from server
    pub surpresscount: i32,        // number of messages rate suppressed
    pub frames: Ring<Frame>,       // [UPDATE_BACKUP]

    /// Frames decoded by the current message, published once it completes.
    pub pending_frames: Vec<Frame>,

    pub time: i32,                 // this is the time value that the client
                                   // is rendering at. always <= cls.realtime

    //
    // transient data from server
    //
    pub layout: String,            // general 2D overlay
    pub inventory: [i32; MAX_ITEMS],

    //
    // server state information
    //
    pub attractloop: bool,         // running the attract loop, any key will menu
    pub servercount: i32,          // server identification for prespawns
    pub gamedir: String,
    pub playernum: i32,

    pub configstrings: Vec<String>, // [MAX_CONFIGSTRINGS]

    //
    // locally derived information from server state
    //
    pub model_draw: Vec<i32>,      // [MAX_MODELS] model indices
    pub model_clip: Vec<i32>,      // [MAX_MODELS] cmodel indices
    pub sound_precache: Vec<i32>,  // [MAX_SOUNDS] sfx indices
    pub image_precache: Vec<i32>,  // [MAX_IMAGES] image indices

    pub clientinfo: Vec<ClientInfo>, // [MAX_CLIENTS]
    pub baseclientinfo: ClientInfo,
    pub weapon_models: Vec<String>,
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            refresh_prepped: false,
            sound_prepped: false,
            force_refdef: false,
            predicted_origin: [0.0; 3],
            predicted_angles: [0.0; 3],
            frame: Frame::default(),
            surpresscount: 0,
            frames: Ring::new(UPDATE_BACKUP as usize),
            pending_frames: Vec::new(),
            time: 0,
            layout: String::new(),
            inventory: [0; MAX_ITEMS],
            attractloop: false,
            servercount: 0,
            gamedir: String::new(),
            playernum: 0,
            configstrings: vec![String::new(); MAX_CONFIGSTRINGS],
            model_draw: vec![0; MAX_MODELS],
            model_clip: vec![0; MAX_MODELS],
            sound_precache: vec![0; MAX_SOUNDS],
            image_precache: vec![0; MAX_IMAGES],
            clientinfo: vec![ClientInfo::default(); MAX_CLIENTS],
            baseclientinfo: ClientInfo::default(),
            weapon_models: Vec::new(),
        }
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// client_static_t
//
// Persistent through an arbitrary number of server connections.
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum ConnState {
    Uninitialized = 0,
    Disconnected = 1,  // not talking to a server
    Connecting = 2,    // sending request packets to the server
    Connected = 3,     // waiting for svc_serverdata
    Active = 4,        // game views should be displayed
}

pub struct ClientStatic {
    pub state: ConnState,

    pub disable_servercount: i32,  // when we receive a frame and cl.servercount
                                   // != cls.disable_servercount, end the loading plaque

    pub connect_time: f32,         // for connection retransmits
    pub server_protocol: i32,      // in case we are doing some kind of version hack

    pub download_percent: i32,

    // demo recording info must be here, so it isn't cleared on level change
    pub demo: Option<DemoWriter>,
    pub demo_waiting: bool,        // don't record until a non-delta message is received
}

impl Default for ClientStatic {
    fn default() -> Self {
        Self {
            state: ConnState::Disconnected,
            disable_servercount: -1,
            connect_time: 0.0,
            server_protocol: 0,
            download_percent: 0,
            demo: None,
            demo_waiting: false,
        }
    }
}

impl ClientStatic {
    pub fn demo_recording(&self) -> bool {
        self.demo.is_some()
    }
}

// ============================================================
// Entity tables
// ============================================================

/// Per-entity render state and the pool of entity states referenced by
/// frames.
pub struct ClientEntState {
    pub cl_entities: Vec<CEntity>,    // [MAX_EDICTS]
    pub cl_parse_entities: EntityPool,
}

impl ClientEntState {
    pub fn new(pool_capacity: usize, pool_margin: usize) -> Self {
        Self {
            cl_entities: (0..MAX_EDICTS).into_par_iter().map(|_| CEntity::default()).collect(),
            cl_parse_entities: EntityPool::new(pool_capacity, pool_margin),
        }
    }

    /// Forget every entity and rewind the pool. Baselines go too: a new
    /// level sends its own.
    pub fn clear(&mut self) {
        self.cl_entities.par_iter_mut().for_each(|ent| *ent = CEntity::default());
        self.cl_parse_entities.reset();
    }
}

// ============================================================
// Decoder diagnostics
// ============================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Per-bit counts of entity presence bits seen.
    pub bitcounts: [u32; 32],
    /// Frames marked invalid because their delta base was unusable.
    pub stale_deltas: u32,
    /// Recoverable oddities that were logged and skipped.
    pub soft_warnings: u32,
    pub messages: u32,
}

impl ParseStats {
    /// Count a recoverable oddity and report it to developers.
    pub fn soft_warning(&mut self, text: &str) {
        self.soft_warnings += 1;
        q2snap_common::common::com_dprintf(text);
    }
}

/// Cvar values sampled once per message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseSettings {
    pub shownet: i32,
    pub predict: bool,
    pub noskins: bool,
    pub vwep: bool,
}

// ============================================================
// Collaborators
// ============================================================

/// A decoded svc_sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundStart {
    pub pos: Option<Vec3>,
    pub ent: i32,
    pub channel: i32,
    pub sfx: i32,
    pub volume: f32,
    pub attenuation: f32,
    pub timeofs: f32,
}

/// A decoded svc_download chunk. `data` is `None` when the server does
/// not have the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadChunk {
    pub percent: i32,
    pub data: Option<Vec<u8>>,
}

/// Everything outside the decoder: renderer, sound, console and the
/// effects layer. Handles of 0 mean "not loaded".
pub trait ClientCallbacks {
    fn r_register_model(&mut self, _name: &str) -> i32 { 0 }
    fn r_register_skin(&mut self, _name: &str) -> i32 { 0 }
    fn draw_find_pic(&mut self, _name: &str) -> i32 { 0 }
    fn cm_inline_model(&mut self, _name: &str) -> i32 { 0 }
    fn s_register_sound(&mut self, _name: &str) -> i32 { 0 }

    fn s_start_sound(&mut self, _sound: &SoundStart) {}
    fn s_start_local_sound(&mut self, _name: &str) {}
    fn ogg_play_track(&mut self, _track: &str) {}

    fn scr_center_print(&mut self, _text: &str) {}
    fn scr_play_cinematic(&mut self, _name: &str) {}
    fn scr_end_loading_plaque(&mut self) {}
    fn cbuf_add_text(&mut self, _text: &str) {}

    fn cl_set_lightstyle(&mut self, _index: usize, _map: &str) {}
    fn cl_entity_event(&mut self, _ent: &EntityState) {}
    fn cl_teleporter_particles(&mut self, _ent: &EntityState) {}
    fn cl_check_prediction_error(&mut self, _frame: &Frame) {}
    fn cl_temp_entity(&mut self, _te: &TempEntity) {}
    fn cl_muzzle_flash(&mut self, _ent: i32, _weapon: i32, _silenced: bool) {}
    fn cl_muzzle_flash2(&mut self, _ent: i32, _flash: i32) {}
    fn cl_download(&mut self, _chunk: &DownloadChunk) {}
}

/// Callbacks that ignore everything.
pub struct NullCallbacks;

impl ClientCallbacks for NullCallbacks {}

/// Everything a handler may touch while one message is parsed.
pub struct ParseContext<'a> {
    pub cl: &'a mut ClientState,
    pub cls: &'a mut ClientStatic,
    pub ent_state: &'a mut ClientEntState,
    pub stats: &'a mut ParseStats,
    pub settings: ParseSettings,
    pub callbacks: &'a mut dyn ClientCallbacks,
}

/// Truncate a path the way fixed MAX_QPATH buffers do.
pub fn qpath(s: &str) -> String {
    s.chars().take(MAX_QPATH - 1).collect()
}
