#![crate_type = "rlib"]
//! Runtime glue for modules generated by plrs.
//!
//! `plrs` rewrites the header above, fills in the server include path and
//! major version and replaces the declaration marker below; everything else
//! is compiled into the generated extension as is. Targets PostgreSQL 12 or
//! later on 64-bit little-endian hosts with pass-by-value `float8`.

#![allow(dead_code, non_snake_case, clippy::missing_safety_doc)]

mod methods;
mod package;

use std::ffi::{c_char, c_int};

/// Server headers this module was generated against.
pub const PG_INCLUDE_DIR: &str = "/usr/include/postgresql/server";

/// Server major version the magic block claims.
const PG_MAJOR: c_int = /*{pgmajor}*/16;

/// Layout of the newest servers; older ones read a prefix of it, sized by `len`.
#[repr(C)]
pub struct Pg_magic_struct {
    len: c_int,
    version: c_int,
    funcmaxargs: c_int,
    indexmaxkeys: c_int,
    namedatalen: c_int,
    float8byval: c_int,
    abi_extra: [u8; 32],
    name: *const c_char,
    module_version: *const c_char,
}

unsafe impl Sync for Pg_magic_struct {}

const MAGIC_LEN: usize = if PG_MAJOR >= 18 {
    std::mem::size_of::<Pg_magic_struct>()
} else if PG_MAJOR >= 15 {
    std::mem::offset_of!(Pg_magic_struct, name)
} else {
    std::mem::offset_of!(Pg_magic_struct, abi_extra)
};

static PG_MAGIC: Pg_magic_struct = Pg_magic_struct {
    len: MAGIC_LEN as c_int,
    version: PG_MAJOR * 100,
    funcmaxargs: 100,
    indexmaxkeys: 32,
    namedatalen: 64,
    float8byval: 1,
    abi_extra: *b"PostgreSQL\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0",
    name: std::ptr::null(),
    module_version: std::ptr::null(),
};

#[no_mangle]
pub extern "C" fn Pg_magic_func() -> &'static Pg_magic_struct {
    &PG_MAGIC
}

/// Raises `ERROR` with `message`; never returns to the caller.
///
/// The caller must not hold anything that needs dropping: the server
/// longjmps out of `errfinish`.
#[no_mangle]
pub unsafe extern "C" fn elog_error(message: *const c_char) -> ! {
    if pl::errstart(pl::ERROR, std::ptr::null()) {
        pl::errmsg_internal(c"%s".as_ptr(), message);
        pl::errfinish(c"plrs".as_ptr(), 0, c"elog_error".as_ptr());
    }
    std::process::abort()
}

//{funcdec}

pub mod pl {
    use std::any::Any;
    use std::ffi::{c_char, c_int, c_void};

    pub type Datum = usize;
    pub type Oid = u32;

    pub(crate) const ERROR: c_int = 21;

    #[repr(C)]
    pub struct NullableDatum {
        pub value: Datum,
        pub isnull: bool,
    }

    #[repr(C)]
    pub struct FunctionCallInfoBaseData {
        pub flinfo: *mut c_void,
        pub context: *mut c_void,
        pub resultinfo: *mut c_void,
        pub fncollation: Oid,
        pub isnull: bool,
        pub nargs: i16,
        pub args: [NullableDatum; 0],
    }

    pub type FunctionCallInfo = *mut FunctionCallInfoBaseData;

    #[repr(C)]
    pub struct FinfoRecord {
        pub api_version: c_int,
    }

    pub static FINFO_V1: FinfoRecord = FinfoRecord { api_version: 1 };

    extern "C" {
        fn palloc(size: usize) -> *mut c_void;
        fn pg_detoast_datum_packed(datum: *mut c_void) -> *mut c_void;
        fn pg_detoast_datum(datum: *mut c_void) -> *mut c_void;
        fn deconstruct_array(
            array: *mut c_void,
            elmtype: Oid,
            elmlen: c_int,
            elmbyval: bool,
            elmalign: c_char,
            elemsp: *mut *mut Datum,
            nullsp: *mut *mut bool,
            nelemsp: *mut c_int,
        );
        fn construct_array(
            elems: *mut Datum,
            nelems: c_int,
            elmtype: Oid,
            elmlen: c_int,
            elmbyval: bool,
            elmalign: c_char,
        ) -> *mut c_void;
        pub(crate) fn errstart(elevel: c_int, domain: *const c_char) -> bool;
        pub(crate) fn errmsg_internal(fmt: *const c_char, ...) -> c_int;
        pub(crate) fn errfinish(filename: *const c_char, lineno: c_int, funcname: *const c_char);
    }

    /// Datum → Rust value.
    pub trait FromDatum: Sized {
        unsafe fn from_datum(datum: Datum) -> Self;
    }

    /// Rust value → Datum; variable-length values are copied into palloc'd memory.
    pub trait IntoDatum {
        unsafe fn into_datum(self) -> Datum;
    }

    /// Element layout as `deconstruct_array` wants it.
    pub trait ArrayElement: FromDatum + IntoDatum {
        const OID: Oid;
        const LEN: c_int;
        const BYVAL: bool;
        const ALIGN: u8;
    }

    macro_rules! by_value {
        ($ty:ty, $oid:expr, $len:expr, $align:expr, |$d:ident| $from:expr, |$v:ident| $into:expr) => {
            impl FromDatum for $ty {
                unsafe fn from_datum($d: Datum) -> Self {
                    $from
                }
            }
            impl IntoDatum for $ty {
                unsafe fn into_datum(self) -> Datum {
                    let $v = self;
                    $into
                }
            }
            impl ArrayElement for $ty {
                const OID: Oid = $oid;
                const LEN: c_int = $len;
                const BYVAL: bool = true;
                const ALIGN: u8 = $align;
            }
        };
    }

    by_value!(bool, 16, 1, b'c', |d| d & 0xff != 0, |v| v as Datum);
    by_value!(i16, 21, 2, b's', |d| d as i16, |v| v as isize as Datum);
    by_value!(i32, 23, 4, b'i', |d| d as i32, |v| v as isize as Datum);
    by_value!(i64, 20, 8, b'd', |d| d as i64, |v| v as Datum);
    by_value!(f32, 700, 4, b'i', |d| f32::from_bits(d as u32), |v| v.to_bits() as Datum);
    by_value!(f64, 701, 8, b'd', |d| f64::from_bits(d as u64), |v| v.to_bits() as Datum);

    impl FromDatum for Vec<u8> {
        unsafe fn from_datum(datum: Datum) -> Self {
            varlena_bytes(datum).to_vec()
        }
    }

    impl IntoDatum for Vec<u8> {
        unsafe fn into_datum(self) -> Datum {
            new_varlena(&self)
        }
    }

    impl FromDatum for String {
        unsafe fn from_datum(datum: Datum) -> Self {
            String::from_utf8_lossy(varlena_bytes(datum)).into_owned()
        }
    }

    impl IntoDatum for String {
        unsafe fn into_datum(self) -> Datum {
            new_varlena(self.as_bytes())
        }
    }

    impl ArrayElement for String {
        const OID: Oid = 25;
        const LEN: c_int = -1;
        const BYVAL: bool = false;
        const ALIGN: u8 = b'i';
    }

    /// Payload of a (possibly short-header) varlena after detoasting.
    unsafe fn varlena_bytes<'a>(datum: Datum) -> &'a [u8] {
        let ptr = pg_detoast_datum_packed(datum as *mut c_void) as *const u8;
        let first = *ptr;
        if first & 0x01 == 0x01 {
            let total = (first >> 1) as usize;
            std::slice::from_raw_parts(ptr.add(1), total - 1)
        } else {
            let header = (ptr as *const u32).read_unaligned();
            let total = (header >> 2) as usize;
            std::slice::from_raw_parts(ptr.add(4), total - 4)
        }
    }

    unsafe fn new_varlena(bytes: &[u8]) -> Datum {
        let total = bytes.len() + 4;
        let ptr = palloc(total) as *mut u8;
        (ptr as *mut u32).write_unaligned((total as u32) << 2);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.add(4), bytes.len());
        ptr as Datum
    }

    unsafe fn nullable(fcinfo: FunctionCallInfo, idx: usize) -> &'static NullableDatum {
        &*(*fcinfo).args.as_ptr().add(idx)
    }

    pub unsafe fn arg<T: FromDatum>(fcinfo: FunctionCallInfo, idx: usize) -> Result<T, String> {
        match arg_opt(fcinfo, idx)? {
            Some(v) => Ok(v),
            None => Err(format!("argument {} must not be null", idx + 1)),
        }
    }

    pub unsafe fn arg_opt<T: FromDatum>(
        fcinfo: FunctionCallInfo,
        idx: usize,
    ) -> Result<Option<T>, String> {
        let nd = nullable(fcinfo, idx);
        Ok(if nd.isnull { None } else { Some(T::from_datum(nd.value)) })
    }

    pub unsafe fn arg_array<T: ArrayElement>(
        fcinfo: FunctionCallInfo,
        idx: usize,
    ) -> Result<Vec<T>, String> {
        match arg_array_opt(fcinfo, idx)? {
            Some(v) => Ok(v),
            None => Err(format!("argument {} must not be null", idx + 1)),
        }
    }

    pub unsafe fn arg_array_opt<T: ArrayElement>(
        fcinfo: FunctionCallInfo,
        idx: usize,
    ) -> Result<Option<Vec<T>>, String> {
        let nd = nullable(fcinfo, idx);
        if nd.isnull {
            return Ok(None);
        }
        let array = pg_detoast_datum(nd.value as *mut c_void);
        let mut elems: *mut Datum = std::ptr::null_mut();
        let mut nulls: *mut bool = std::ptr::null_mut();
        let mut count: c_int = 0;
        deconstruct_array(
            array,
            T::OID,
            T::LEN,
            T::BYVAL,
            T::ALIGN as c_char,
            &mut elems,
            &mut nulls,
            &mut count,
        );
        let mut out = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            if *nulls.add(i) {
                return Err(format!(
                    "argument {} contains a null element at position {}",
                    idx + 1,
                    i + 1
                ));
            }
            out.push(T::from_datum(*elems.add(i)));
        }
        Ok(Some(out))
    }

    pub unsafe fn ret<T: IntoDatum>(fcinfo: FunctionCallInfo, value: T) -> Datum {
        (*fcinfo).isnull = false;
        value.into_datum()
    }

    pub unsafe fn ret_opt<T: IntoDatum>(fcinfo: FunctionCallInfo, value: Option<T>) -> Datum {
        match value {
            Some(v) => ret(fcinfo, v),
            None => {
                (*fcinfo).isnull = true;
                0
            }
        }
    }

    pub unsafe fn ret_array<T: ArrayElement>(fcinfo: FunctionCallInfo, values: Vec<T>) -> Datum {
        let mut datums: Vec<Datum> = values.into_iter().map(|v| v.into_datum()).collect();
        let array = construct_array(
            datums.as_mut_ptr(),
            datums.len() as c_int,
            T::OID,
            T::LEN,
            T::BYVAL,
            T::ALIGN as c_char,
        );
        (*fcinfo).isnull = false;
        array as Datum
    }

    pub unsafe fn ret_array_opt<T: ArrayElement>(
        fcinfo: FunctionCallInfo,
        values: Option<Vec<T>>,
    ) -> Datum {
        match values {
            Some(v) => ret_array(fcinfo, v),
            None => {
                (*fcinfo).isnull = true;
                0
            }
        }
    }

    pub unsafe fn ret_void(fcinfo: FunctionCallInfo) -> Datum {
        (*fcinfo).isnull = false;
        0
    }

    /// Text of a caught panic, prefixed with the function it escaped from.
    pub fn panic_message(function: &str, payload: Box<dyn Any + Send>) -> String {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        format!("panic in {function}: {detail}")
    }

    /// Copies `message` into palloc'd memory and drops the original, so the
    /// caller holds nothing that needs dropping when it raises the error.
    pub unsafe fn palloc_cstring(message: String) -> *const c_char {
        let bytes: Vec<u8> = message.into_bytes().into_iter().filter(|b| *b != 0).collect();
        let ptr = palloc(bytes.len() + 1) as *mut u8;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
        *ptr.add(bytes.len()) = 0;
        ptr as *const c_char
    }
}
