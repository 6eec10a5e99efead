// src/openrtb/request.rs

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

/// OpenRTB 2.5 BidRequest 结构体。
///
/// 各类 `ext` 字段保持为不透明的 JSON 值，由各 bidder 适配器自行解码；
/// site/app/device/user/source/regs 这些共享上下文使用 `Arc` 持有，
/// 拆分出的多个 wire request 之间按引用共享，不做深拷贝。
/// 每个对象上没有建模的字段收进 `rest`，重新编码时原样写回。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BidRequest {
    pub id: String,

    /// 广告展示请求列表（imp）
    #[serde(default)]
    pub imp: Vec<Imp>,

    /// 网站信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<Arc<Site>>,

    /// 应用信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<Arc<App>>,

    /// 设备信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Arc<Device>>,

    /// 用户信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Arc<User>>,

    /// 请求来源信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Arc<Source>>,

    /// 隐私法规信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regs: Option<Arc<Regs>>,

    // 其它简单字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmax: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wseat: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bseat: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allimps: Option<i32>,
    /// 输出币种列表
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cur: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wlang: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcat: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badv: Vec<String>,

    /// 请求级扩展，不同 bidder 会替换成自己的格式
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    /// 未建模的字段，原样透传给 bidder
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl BidRequest {
    /// 复制除 imp 以外的全部字段，共享上下文只增加引用计数
    pub fn without_imps(&self) -> BidRequest {
        BidRequest {
            id: self.id.clone(),
            imp: Vec::new(),
            site: self.site.clone(),
            app: self.app.clone(),
            device: self.device.clone(),
            user: self.user.clone(),
            source: self.source.clone(),
            regs: self.regs.clone(),
            test: self.test,
            at: self.at,
            tmax: self.tmax,
            wseat: self.wseat.clone(),
            bseat: self.bseat.clone(),
            allimps: self.allimps,
            cur: self.cur.clone(),
            wlang: self.wlang.clone(),
            bcat: self.bcat.clone(),
            badv: self.badv.clone(),
            ext: self.ext.clone(),
            rest: self.rest.clone(),
        }
    }
}

/// Imp 表示一个可售卖的广告位
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Imp {
    /// 请求内唯一，响应里用 impid 回连
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmp: Option<Pmp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displaymanager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displaymanagerver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instl: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagid: Option<String>,

    /// 底价，0 表示未设置
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bidfloor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidfloorcur: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// `{"prebid": {...}, "bidder": {...}}` 形式的扩展信封
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Imp {
    /// 是否还带有任意一种媒体类型
    pub fn has_any_media(&self) -> bool {
        self.banner.is_some() || self.video.is_some() || self.audio.is_some() || self.native.is_some()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Banner {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<Format>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub btype: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub battr: Vec<i32>,
    /// 广告位置，参见 [`AdPosition`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topframe: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Format {
    pub w: u64,
    pub h: u64,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Format {
    pub fn new(w: u64, h: u64) -> Self {
        Self {
            w,
            h,
            rest: Map::new(),
        }
    }
}

/// OpenRTB 2.5 AdPosition 枚举里本系统会用到的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdPosition {
    Unknown = 0,
    AboveTheFold = 1,
    BelowTheFold = 3,
}

impl From<AdPosition> for u8 {
    fn from(pos: AdPosition) -> Self {
        pos as u8
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Video {
    #[serde(default)]
    pub mimes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minduration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startdelay: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linearity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Audio {
    #[serde(default)]
    pub mimes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minduration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Native {
    /// Native Ad Specification 请求体（字符串形式的 JSON）
    pub request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub battr: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Pmp 私有交易信息
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Pmp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_auction: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deals: Vec<Deal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Deal {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bidfloor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidfloorcur: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wseat: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Publisher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Site {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct App {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storeurl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    /// SDK 常把 `{"prebid":{"source":..,"version":..}}` 放在这里
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Geo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub geo_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// dnt / lmt / connectiontype 等隐私和网络字段落在 `rest` 里
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devicetype: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyeruid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yob: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fd: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pchain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Regs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coppa: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}
