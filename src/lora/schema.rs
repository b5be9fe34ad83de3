//! FlatBuffers bindings for the LoRA adapter file.
//!
//! ```text
//! table Parameter { name:string; dims:[int64]; data_type:TensorDataType; raw_data:[uint8]; }
//! table Adapter { format_version:int; adapter_version:int; model_version:int; parameters:[Parameter]; }
//! root_type Adapter;
//! file_identifier "TORT";
//! ```
//!
//! Kept in the shape `flatc --rust` emits so it can be regenerated from the
//! schema without touching callers.

use flatbuffers::{
    FlatBufferBuilder, Follow, ForwardsUOffset, InvalidFlatbuffer, Table, VOffsetT, Vector,
    Verifiable, Verifier, WIPOffset,
};

pub const ADAPTER_FILE_IDENTIFIER: &str = "TORT";
pub const ADAPTER_FORMAT_VERSION: i32 = 1;

#[derive(Copy, Clone, PartialEq)]
pub struct ParameterTable<'a> {
    pub _tab: Table<'a>,
}

impl<'a> Follow<'a> for ParameterTable<'a> {
    type Inner = ParameterTable<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            _tab: Table::new(buf, loc),
        }
    }
}

impl<'a> ParameterTable<'a> {
    pub const VT_NAME: VOffsetT = 4;
    pub const VT_DIMS: VOffsetT = 6;
    pub const VT_DATA_TYPE: VOffsetT = 8;
    pub const VT_RAW_DATA: VOffsetT = 10;

    #[inline]
    pub fn name(&self) -> Option<&'a str> {
        // Safety: only reachable through a verified root.
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }

    #[inline]
    pub fn dims(&self) -> Option<Vector<'a, i64>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i64>>>(Self::VT_DIMS, None)
        }
    }

    #[inline]
    pub fn data_type(&self) -> i32 {
        unsafe {
            self._tab
                .get::<i32>(Self::VT_DATA_TYPE, Some(0))
                .unwrap_or(0)
        }
    }

    #[inline]
    pub fn raw_data(&self) -> Option<Vector<'a, u8>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, u8>>>(Self::VT_RAW_DATA, None)
        }
    }
}

impl Verifiable for ParameterTable<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i64>>>("dims", Self::VT_DIMS, false)?
            .visit_field::<i32>("data_type", Self::VT_DATA_TYPE, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, u8>>>("raw_data", Self::VT_RAW_DATA, false)?
            .finish();
        Ok(())
    }
}

#[derive(Copy, Clone, PartialEq)]
pub struct AdapterTable<'a> {
    pub _tab: Table<'a>,
}

impl<'a> Follow<'a> for AdapterTable<'a> {
    type Inner = AdapterTable<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            _tab: Table::new(buf, loc),
        }
    }
}

impl<'a> AdapterTable<'a> {
    pub const VT_FORMAT_VERSION: VOffsetT = 4;
    pub const VT_ADAPTER_VERSION: VOffsetT = 6;
    pub const VT_MODEL_VERSION: VOffsetT = 8;
    pub const VT_PARAMETERS: VOffsetT = 10;

    #[inline]
    pub fn format_version(&self) -> i32 {
        unsafe {
            self._tab
                .get::<i32>(Self::VT_FORMAT_VERSION, Some(0))
                .unwrap_or(0)
        }
    }

    #[inline]
    pub fn adapter_version(&self) -> i32 {
        unsafe {
            self._tab
                .get::<i32>(Self::VT_ADAPTER_VERSION, Some(0))
                .unwrap_or(0)
        }
    }

    #[inline]
    pub fn model_version(&self) -> i32 {
        unsafe {
            self._tab
                .get::<i32>(Self::VT_MODEL_VERSION, Some(0))
                .unwrap_or(0)
        }
    }

    #[inline]
    pub fn parameters(&self) -> Option<Vector<'a, ForwardsUOffset<ParameterTable<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<ParameterTable<'a>>>>>(
                    Self::VT_PARAMETERS,
                    None,
                )
        }
    }
}

impl Verifiable for AdapterTable<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i32>("format_version", Self::VT_FORMAT_VERSION, false)?
            .visit_field::<i32>("adapter_version", Self::VT_ADAPTER_VERSION, false)?
            .visit_field::<i32>("model_version", Self::VT_MODEL_VERSION, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<ParameterTable>>>>(
                "parameters",
                Self::VT_PARAMETERS,
                false,
            )?
            .finish();
        Ok(())
    }
}

pub fn create_parameter<'fbb>(
    fbb: &mut FlatBufferBuilder<'fbb>,
    name: WIPOffset<&'fbb str>,
    dims: WIPOffset<Vector<'fbb, i64>>,
    data_type: i32,
    raw_data: WIPOffset<Vector<'fbb, u8>>,
) -> WIPOffset<ParameterTable<'fbb>> {
    let start = fbb.start_table();
    fbb.push_slot_always::<WIPOffset<_>>(ParameterTable::VT_RAW_DATA, raw_data);
    fbb.push_slot_always::<WIPOffset<_>>(ParameterTable::VT_DIMS, dims);
    fbb.push_slot_always::<WIPOffset<_>>(ParameterTable::VT_NAME, name);
    fbb.push_slot::<i32>(ParameterTable::VT_DATA_TYPE, data_type, 0);
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

pub fn create_adapter<'fbb>(
    fbb: &mut FlatBufferBuilder<'fbb>,
    format_version: i32,
    adapter_version: i32,
    model_version: i32,
    parameters: WIPOffset<Vector<'fbb, ForwardsUOffset<ParameterTable<'fbb>>>>,
) -> WIPOffset<AdapterTable<'fbb>> {
    let start = fbb.start_table();
    fbb.push_slot_always::<WIPOffset<_>>(AdapterTable::VT_PARAMETERS, parameters);
    fbb.push_slot::<i32>(AdapterTable::VT_MODEL_VERSION, model_version, 0);
    fbb.push_slot::<i32>(AdapterTable::VT_ADAPTER_VERSION, adapter_version, 0);
    fbb.push_slot::<i32>(AdapterTable::VT_FORMAT_VERSION, format_version, 0);
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}
