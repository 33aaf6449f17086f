// q_shared.rs — foundational types shared by the decoder and its collaborators

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];

pub fn vector_copy(v: &Vec3) -> Vec3 {
    *v
}

// ============================================================
// Limits
// ============================================================

pub const MAX_QPATH: usize = 64;
pub const MAX_STRING_CHARS: usize = 2048;

pub const MAX_EDICTS: usize = 8192;
pub const MAX_CLIENTS: usize = 256;
pub const MAX_LIGHTSTYLES: usize = 256;
pub const MAX_SHADOW_LIGHTS: usize = 256;
pub const MAX_MODELS: usize = 8192;
pub const MAX_SOUNDS: usize = 2048;
pub const MAX_IMAGES: usize = 512;
pub const MAX_ITEMS: usize = 256;
pub const MAX_GENERAL: usize = MAX_CLIENTS * 2;

pub const MAX_MAP_AREAS: usize = 256;

/// Model index the legacy protocols use for "the player's own model".
pub const QII97_PLAYER_MODEL: i32 = 255;
/// Slot a legacy player model is moved to once decoded.
pub const CUSTOM_PLAYER_MODEL: i32 = (MAX_MODELS - 1) as i32;

// ============================================================
// Print / error levels
// ============================================================

pub const PRINT_LOW: i32 = 0;
pub const PRINT_MEDIUM: i32 = 1;
pub const PRINT_HIGH: i32 = 2;
pub const PRINT_CHAT: i32 = 3;

pub const ERR_FATAL: i32 = 4;
pub const ERR_DROP: i32 = 8;
pub const ERR_DISCONNECT: i32 = 16;

// ============================================================
// Config strings
//
// Client-side layout. Older dialects send their own layout which is
// translated by p_convert_config_string_from().
// ============================================================

pub const CS_NAME: usize = 0;
pub const CS_CDTRACK: usize = 1;
pub const CS_SKY: usize = 2;
pub const CS_SKYAXIS: usize = 3;
pub const CS_SKYROTATE: usize = 4;
pub const CS_STATUSBAR: usize = 5;

pub const CS_AIRACCEL: usize = 59;
pub const CS_MAXCLIENTS: usize = 60;
pub const CS_MAPCHECKSUM: usize = 61;

pub const CS_MODELS: usize = 62;
pub const CS_SOUNDS: usize = CS_MODELS + MAX_MODELS;
pub const CS_IMAGES: usize = CS_SOUNDS + MAX_SOUNDS;
pub const CS_LIGHTS: usize = CS_IMAGES + MAX_IMAGES;
pub const CS_SHADOWLIGHTS: usize = CS_LIGHTS + MAX_LIGHTSTYLES;
pub const CS_ITEMS: usize = CS_SHADOWLIGHTS + MAX_SHADOW_LIGHTS;
pub const CS_PLAYERSKINS: usize = CS_ITEMS + MAX_ITEMS;
pub const CS_GENERAL: usize = CS_PLAYERSKINS + MAX_CLIENTS;
/// Sink for strings this client has no slot for.
pub const CS_SKIP: usize = CS_GENERAL + MAX_GENERAL;
pub const MAX_CONFIGSTRINGS: usize = CS_SKIP + 1;

// ============================================================
// Stats
// ============================================================

pub const STAT_HEALTH_ICON: usize = 0;
pub const STAT_HEALTH: usize = 1;
pub const STAT_PICKUP_ICON: usize = 7;
pub const STAT_PICKUP_STRING: usize = 8;

pub const MAX_STATS: usize = 32;

// ============================================================
// Entity effects / events
// ============================================================

pub const EF_ROTATE: u32 = 0x00000001;
pub const EF_GIB: u32 = 0x00000002;
pub const EF_TELEPORTER: u32 = 0x00020000;

pub const RF_BEAM: i32 = 128;

pub const EV_NONE: i32 = 0;
pub const EV_ITEM_RESPAWN: i32 = 1;
pub const EV_FOOTSTEP: i32 = 2;
pub const EV_FALLSHORT: i32 = 3;
pub const EV_FALL: i32 = 4;
pub const EV_FALLFAR: i32 = 5;
pub const EV_PLAYER_TELEPORT: i32 = 6;
pub const EV_OTHER_TELEPORT: i32 = 7;

// ============================================================
// Sound channels
// ============================================================

pub const CHAN_AUTO: i32 = 0;
pub const CHAN_WEAPON: i32 = 1;
pub const CHAN_VOICE: i32 = 2;
pub const CHAN_ITEM: i32 = 3;
pub const CHAN_BODY: i32 = 4;

pub const ATTN_NONE: f32 = 0.0;
pub const ATTN_NORM: f32 = 1.0;

// ============================================================
// Temp entity events
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TempEvent {
    Gunshot = 0,
    Blood = 1,
    Blaster = 2,
    Railtrail = 3,
    Shotgun = 4,
    Explosion1 = 5,
    Explosion2 = 6,
    RocketExplosion = 7,
    GrenadeExplosion = 8,
    Sparks = 9,
    Splash = 10,
    Bubbletrail = 11,
    ScreenSparks = 12,
    ShieldSparks = 13,
    BulletSparks = 14,
    LaserSparks = 15,
    ParasiteAttack = 16,
    RocketExplosionWater = 17,
    GrenadeExplosionWater = 18,
    MedicCableAttack = 19,
    BfgExplosion = 20,
    BfgBigexplosion = 21,
    Bosstport = 22,
    BfgLaser = 23,
    GrappleCable = 24,
    WeldingSparks = 25,
    Greenblood = 26,
    Bluehyperblaster = 27,
    PlasmaExplosion = 28,
    TunnelSparks = 29,
    // ROGUE
    Blaster2 = 30,
    Railtrail2 = 31,
    Flame = 32,
    Lightning = 33,
    Debugtrail = 34,
    PlainExplosion = 35,
    Flashlight = 36,
    Forcewall = 37,
    Heatbeam = 38,
    MonsterHeatbeam = 39,
    Steam = 40,
    Bubbletrail2 = 41,
    Moreblood = 42,
    HeatbeamSparks = 43,
    HeatbeamSteam = 44,
    ChainfistSmoke = 45,
    ElectricSparks = 46,
    TrackerExplosion = 47,
    TeleportEffect = 48,
    DballGoal = 49,
    Widowbeamout = 50,
    Nukeblast = 51,
    Widowsplash = 52,
    Explosion1Big = 53,
    Explosion1Np = 54,
    Flechette = 55,
}

impl TempEvent {
    pub fn from_i32(v: i32) -> Option<Self> {
        use TempEvent::*;
        const EVENTS: [TempEvent; 56] = [
            Gunshot, Blood, Blaster, Railtrail, Shotgun, Explosion1, Explosion2,
            RocketExplosion, GrenadeExplosion, Sparks, Splash, Bubbletrail,
            ScreenSparks, ShieldSparks, BulletSparks, LaserSparks, ParasiteAttack,
            RocketExplosionWater, GrenadeExplosionWater, MedicCableAttack,
            BfgExplosion, BfgBigexplosion, Bosstport, BfgLaser, GrappleCable,
            WeldingSparks, Greenblood, Bluehyperblaster, PlasmaExplosion,
            TunnelSparks, Blaster2, Railtrail2, Flame, Lightning, Debugtrail,
            PlainExplosion, Flashlight, Forcewall, Heatbeam, MonsterHeatbeam,
            Steam, Bubbletrail2, Moreblood, HeatbeamSparks, HeatbeamSteam,
            ChainfistSmoke, ElectricSparks, TrackerExplosion, TeleportEffect,
            DballGoal, Widowbeamout, Nukeblast, Widowsplash, Explosion1Big,
            Explosion1Np, Flechette,
        ];
        usize::try_from(v).ok().and_then(|i| EVENTS.get(i).copied())
    }
}

/// Weapon byte flag on svc_muzzleflash.
pub const MZ_SILENCED: i32 = 128;

// ============================================================
// pmove_state_t
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum PmType {
    #[default]
    Normal = 0,
    Spectator = 1,
    Dead = 2,
    Gib = 3,
    Freeze = 4,
}

impl PmType {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(PmType::Normal),
            1 => Some(PmType::Spectator),
            2 => Some(PmType::Dead),
            3 => Some(PmType::Gib),
            4 => Some(PmType::Freeze),
            _ => None,
        }
    }
}

pub const PMF_DUCKED: u8 = 1;
pub const PMF_JUMP_HELD: u8 = 2;
pub const PMF_ON_GROUND: u8 = 4;
pub const PMF_TIME_WATERJUMP: u8 = 8;
pub const PMF_TIME_LAND: u8 = 16;
pub const PMF_TIME_TELEPORT: u8 = 32;
pub const PMF_NO_PREDICTION: u8 = 64;

/// Movement state shared with client-side prediction. The world origin is
/// kept on the frame because its width depends on the dialect.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PmoveState {
    pub pm_type: PmType,
    pub velocity: [i16; 3], // 12.3 fixed point
    pub pm_flags: u8,
    pub pm_time: u8,
    pub gravity: i16,
    pub delta_angles: [i16; 3],
}

// ============================================================
// entity_state_t
// ============================================================

/// What the server sends about an entity. `old_origin` is where rendering
/// interpolates from, `origin` where it interpolates to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EntityState {
    pub number: i32,
    pub origin: Vec3,
    pub angles: Vec3,
    pub old_origin: Vec3,
    pub modelindex: i32,
    pub modelindex2: i32,
    pub modelindex3: i32,
    pub modelindex4: i32,
    pub frame: i32,
    pub skinnum: i32,
    pub effects: u32,
    pub renderfx: i32,
    pub solid: i32,
    pub sound: i32,
    pub event: i32,
    // current dialect only
    pub rr_effects: u32,
    pub rr_mesh: u32,
    pub scale: Vec3,
}

// ============================================================
// player_state_t
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerState {
    pub pmove: PmoveState,
    pub viewangles: Vec3,
    pub viewoffset: Vec3,
    pub kick_angles: Vec3,
    pub gunangles: Vec3,
    pub gunoffset: Vec3,
    pub gunindex: i32,
    pub gunframe: i32,
    pub blend: [f32; 4],
    pub fov: f32,
    pub rdflags: i32,
    pub stats: [i16; MAX_STATS],
}
