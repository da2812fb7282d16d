//! Quad renderer: pipeline construction, texture upload, and the
//! lock-step render loop.

use std::time::Instant;

use anyhow::{anyhow, Context};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use tracing::info;
use winit::window::Window;

use helion_rhi::{
    BufferDesc, BufferUsage, CpuAccess, DeviceDesc, Extent2d, Extent3d, GpuAccessRate, ImageDesc,
    ImageFormat, ImageType, ImageUsage, ImageViewDesc, MappedBuffer, PresentMode, PresentTarget,
    Swapchain,
};
use helion_vulkan::sync::{create_fence, create_semaphore, reset_fence, wait_for_fence};
use helion_vulkan::{
    VulkanBuffer, VulkanDevice, VulkanImage, VulkanImageView, VulkanInstance, VulkanReceipt,
};

const TEXTURE_SIZE: u32 = 256;
const CHECKER_CELL: u32 = 32;

/// Adapter from a winit window to the RHI present target contract.
struct WindowTarget<'a>(&'a Window);

impl HasDisplayHandle for WindowTarget<'_> {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.0.display_handle()
    }
}

impl HasWindowHandle for WindowTarget<'_> {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.0.window_handle()
    }
}

impl PresentTarget for WindowTarget<'_> {
    fn extent(&self) -> Extent2d {
        let size = self.0.inner_size();
        Extent2d::new(size.width, size.height)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
    color: [f32; 3],
    tex_coords: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Uniforms {
    proj: Mat4,
    view: Mat4,
    model: Mat4,
}

const VERTICES: [Vertex; 4] = [
    Vertex {
        position: [-0.5, -0.5],
        color: [1.0, 1.0, 1.0],
        tex_coords: [0.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5],
        color: [1.0, 0.8, 0.8],
        tex_coords: [1.0, 0.0],
    },
    Vertex {
        position: [0.5, 0.5],
        color: [0.8, 1.0, 0.8],
        tex_coords: [1.0, 1.0],
    },
    Vertex {
        position: [-0.5, 0.5],
        color: [0.8, 0.8, 1.0],
        tex_coords: [0.0, 1.0],
    },
];

const INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Everything needed to draw the rotating quad.
pub struct QuadRenderer {
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    descriptor_set: vk::DescriptorSet,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    sampler: vk::Sampler,
    render_finished: vk::Semaphore,
    frame_fence: vk::Fence,
    // Resources drop before the device below.
    vertex_buffer: VulkanBuffer,
    index_buffer: VulkanBuffer,
    uniform_buffer: VulkanBuffer,
    // The GPU samples these every frame; kept alive until teardown.
    #[allow(dead_code)]
    texture_view: VulkanImageView,
    #[allow(dead_code)]
    texture: VulkanImage,
    device: VulkanDevice,
    // The instance must outlive the device.
    #[allow(dead_code)]
    instance: VulkanInstance,
    start: Instant,
}

impl QuadRenderer {
    pub fn new(window: &Window) -> anyhow::Result<Self> {
        let instance = VulkanInstance::new("helion-quad", cfg!(debug_assertions))
            .context("instance creation failed")?;

        let desc = DeviceDesc {
            use_graphics: true,
            use_compute: false,
            present_mode: PresentMode::VSync,
        };
        let device = VulkanDevice::new(&instance, &desc, Some(&WindowTarget(window)))
            .context("device creation failed")?;

        let swapchain = device
            .vk_swapchain()
            .ok_or_else(|| anyhow!("device has no swapchain"))?;
        let surface_format = swapchain.surface_format();
        info!(
            "swapchain: {} images, format {:?}",
            swapchain.image_count(),
            surface_format.format
        );

        let vk_device = device.device();
        let graphics_family = device
            .queue_plan()
            .graphics
            .ok_or_else(|| anyhow!("no graphics queue"))?
            .family;

        let render_pass = unsafe { create_render_pass(vk_device, surface_format.format)? };
        let framebuffers = unsafe { create_framebuffers(&device, render_pass)? };

        let descriptor_set_layout = unsafe { create_descriptor_set_layout(vk_device)? };
        let (pipeline_layout, pipeline) =
            unsafe { create_pipeline(vk_device, render_pass, descriptor_set_layout)? };

        let command_pool = unsafe {
            let info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            vk_device
                .create_command_pool(&info, None)
                .context("command pool creation failed")?
        };

        // Geometry, written once through the mapping guard.
        let mut vertex_buffer = device.create_buffer(&BufferDesc {
            size: std::mem::size_of_val(&VERTICES) as u64,
            usage: BufferUsage::VERTEX,
            cpu_access: CpuAccess::WRITE,
            gpu_access_rate: GpuAccessRate::Frequent,
        })?;
        MappedBuffer::new(&mut vertex_buffer)?.write(0, &VERTICES)?;

        let mut index_buffer = device.create_buffer(&BufferDesc {
            size: std::mem::size_of_val(&INDICES) as u64,
            usage: BufferUsage::INDEX,
            cpu_access: CpuAccess::WRITE,
            gpu_access_rate: GpuAccessRate::Frequent,
        })?;
        MappedBuffer::new(&mut index_buffer)?.write(0, &INDICES)?;

        let uniform_buffer = device.create_buffer(&BufferDesc {
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: BufferUsage::UNIFORM,
            cpu_access: CpuAccess::WRITE,
            gpu_access_rate: GpuAccessRate::Frequent,
        })?;

        let (texture, texture_view) =
            upload_texture(&device, command_pool).context("texture upload failed")?;

        let sampler = unsafe { create_sampler(vk_device)? };

        let (descriptor_pool, descriptor_set) = unsafe {
            create_descriptors(
                vk_device,
                descriptor_set_layout,
                &uniform_buffer,
                &texture_view,
                sampler,
            )?
        };

        let command_buffers = unsafe {
            let info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(framebuffers.len() as u32);
            vk_device
                .allocate_command_buffers(&info)
                .context("command buffer allocation failed")?
        };

        let render_finished = unsafe { create_semaphore(vk_device)? };
        let frame_fence = unsafe { create_fence(vk_device, false)? };

        let renderer = Self {
            render_pass,
            framebuffers,
            descriptor_set_layout,
            descriptor_pool,
            descriptor_set,
            pipeline_layout,
            pipeline,
            command_pool,
            command_buffers,
            sampler,
            render_finished,
            frame_fence,
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            texture_view,
            texture,
            device,
            instance,
            start: Instant::now(),
        };

        renderer.record_commands()?;

        Ok(renderer)
    }

    /// Record one command buffer per swapchain image.
    fn record_commands(&self) -> anyhow::Result<()> {
        let device = self.device.device();
        let extent = self
            .device
            .vk_swapchain()
            .ok_or_else(|| anyhow!("device has no swapchain"))?
            .vk_extent();

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.01, 0.01, 0.012, 1.0],
            },
        }];

        for (i, &cmd) in self.command_buffers.iter().enumerate() {
            unsafe {
                device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;

                let begin_info = vk::CommandBufferBeginInfo::default();
                device.begin_command_buffer(cmd, &begin_info)?;

                let pass_info = vk::RenderPassBeginInfo::default()
                    .render_pass(self.render_pass)
                    .framebuffer(self.framebuffers[i])
                    .render_area(vk::Rect2D {
                        offset: vk::Offset2D { x: 0, y: 0 },
                        extent,
                    })
                    .clear_values(&clear_values);

                device.cmd_begin_render_pass(cmd, &pass_info, vk::SubpassContents::INLINE);
                device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);

                let viewport = vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: extent.width as f32,
                    height: extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                };
                device.cmd_set_viewport(cmd, 0, &[viewport]);
                device.cmd_set_scissor(
                    cmd,
                    0,
                    &[vk::Rect2D {
                        offset: vk::Offset2D { x: 0, y: 0 },
                        extent,
                    }],
                );

                device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.handle()], &[0]);
                device.cmd_bind_index_buffer(
                    cmd,
                    self.index_buffer.handle(),
                    0,
                    vk::IndexType::UINT16,
                );
                device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline_layout,
                    0,
                    &[self.descriptor_set],
                    &[],
                );

                device.cmd_draw_indexed(cmd, INDICES.len() as u32, 1, 0, 0, 0);

                device.cmd_end_render_pass(cmd);
                device.end_command_buffer(cmd)?;
            }
        }

        Ok(())
    }

    /// One frame, fully serialized: acquire, update, submit, wait, present.
    pub fn render_frame(&mut self) -> anyhow::Result<()> {
        let image_index = self
            .device
            .vk_swapchain_mut()
            .ok_or_else(|| anyhow!("device has no swapchain"))?
            .acquire_next_image()?;

        self.update_uniforms()?;

        let device = self.device.device();
        let queue = self
            .device
            .graphics_queue()
            .ok_or_else(|| anyhow!("no graphics queue"))?;

        let command_buffers = [self.command_buffers[image_index as usize]];
        let signal_semaphores = [self.render_finished];
        let submit = vk::SubmitInfo::default()
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            reset_fence(device, self.frame_fence)?;
            device
                .queue_submit(queue, &[submit], self.frame_fence)
                .context("queue submit failed")?;
            wait_for_fence(device, self.frame_fence)?;
        }

        let receipt = VulkanReceipt::new(self.render_finished);
        self.device
            .vk_swapchain_mut()
            .ok_or_else(|| anyhow!("device has no swapchain"))?
            .present(&[&receipt])?;

        Ok(())
    }

    /// Rebuild the swapchain-dependent state for a new window size.
    pub fn handle_resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        let extent = Extent2d::new(width, height);
        let swapchain = self
            .device
            .vk_swapchain()
            .ok_or_else(|| anyhow!("device has no swapchain"))?;
        if swapchain.extent() == extent {
            return Ok(());
        }

        self.device.wait_idle()?;
        self.device
            .vk_swapchain_mut()
            .ok_or_else(|| anyhow!("device has no swapchain"))?
            .resize(extent)?;

        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.device().destroy_framebuffer(framebuffer, None);
            }
        }
        self.framebuffers = unsafe { create_framebuffers(&self.device, self.render_pass)? };
        self.record_commands()?;

        info!("resized to {width}x{height}");
        Ok(())
    }

    fn update_uniforms(&mut self) -> anyhow::Result<()> {
        let extent = self
            .device
            .vk_swapchain()
            .ok_or_else(|| anyhow!("device has no swapchain"))?
            .extent();
        let aspect = extent.width as f32 / extent.height.max(1) as f32;

        let mut proj = Mat4::perspective_rh(45_f32.to_radians(), aspect, 0.1, 10.0);
        // Vulkan clip space Y points down.
        proj.y_axis.y *= -1.0;

        let angle = self.start.elapsed().as_secs_f32();
        let uniforms = Uniforms {
            proj,
            view: Mat4::IDENTITY,
            model: Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0))
                * Mat4::from_rotation_y(angle),
        };

        let mut mapped = MappedBuffer::new(&mut self.uniform_buffer)?;
        mapped.write(0, std::slice::from_ref(&uniforms))?;

        Ok(())
    }
}

impl Drop for QuadRenderer {
    fn drop(&mut self) {
        let _ = self.device.wait_idle();

        let device = self.device.device();
        unsafe {
            device.destroy_fence(self.frame_fence, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_sampler(self.sampler, None);
            device.destroy_command_pool(self.command_pool, None);
            device.destroy_descriptor_pool(self.descriptor_pool, None);
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_render_pass(self.render_pass, None);
        }
        // Buffers, the texture, and the swapchain release themselves before
        // the device and instance drop last.
    }
}

/// # Safety
/// The device must be valid.
unsafe fn create_render_pass(
    device: &ash::Device,
    format: vk::Format,
) -> anyhow::Result<vk::RenderPass> {
    let attachments = [vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];

    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

    let info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    device
        .create_render_pass(&info, None)
        .context("render pass creation failed")
}

/// # Safety
/// The device and render pass must be valid.
unsafe fn create_framebuffers(
    device: &VulkanDevice,
    render_pass: vk::RenderPass,
) -> anyhow::Result<Vec<vk::Framebuffer>> {
    let swapchain = device
        .vk_swapchain()
        .ok_or_else(|| anyhow!("device has no swapchain"))?;
    let extent = swapchain.vk_extent();

    swapchain
        .views()
        .iter()
        .map(|view| {
            let attachments = [view.handle()];
            let info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            device
                .device()
                .create_framebuffer(&info, None)
                .context("framebuffer creation failed")
        })
        .collect()
}

/// # Safety
/// The device must be valid.
unsafe fn create_descriptor_set_layout(
    device: &ash::Device,
) -> anyhow::Result<vk::DescriptorSetLayout> {
    let bindings = [
        vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX),
        vk::DescriptorSetLayoutBinding::default()
            .binding(1)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ];

    let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
    device
        .create_descriptor_set_layout(&info, None)
        .context("descriptor set layout creation failed")
}

/// # Safety
/// All handles must be valid.
unsafe fn create_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    descriptor_set_layout: vk::DescriptorSetLayout,
) -> anyhow::Result<(vk::PipelineLayout, vk::Pipeline)> {
    let vert_info =
        vk::ShaderModuleCreateInfo::default().code(helion_shaders::quad_vert_shader());
    let vert_module = device
        .create_shader_module(&vert_info, None)
        .context("vertex shader module creation failed")?;

    let frag_info =
        vk::ShaderModuleCreateInfo::default().code(helion_shaders::quad_frag_shader());
    let frag_module = match device.create_shader_module(&frag_info, None) {
        Ok(module) => module,
        Err(err) => {
            device.destroy_shader_module(vert_module, None);
            return Err(err).context("fragment shader module creation failed");
        }
    };

    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_module)
            .name(c"main"),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_module)
            .name(c"main"),
    ];

    let bindings = [vk::VertexInputBindingDescription::default()
        .binding(0)
        .stride(std::mem::size_of::<Vertex>() as u32)
        .input_rate(vk::VertexInputRate::VERTEX)];

    let attributes = [
        vk::VertexInputAttributeDescription::default()
            .location(0)
            .binding(0)
            .format(vk::Format::R32G32_SFLOAT)
            .offset(0),
        vk::VertexInputAttributeDescription::default()
            .location(1)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(8),
        vk::VertexInputAttributeDescription::default()
            .location(2)
            .binding(0)
            .format(vk::Format::R32G32_SFLOAT)
            .offset(20),
    ];

    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);

    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)];

    let color_blend =
        vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let set_layouts = [descriptor_set_layout];
    let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
    let layout = match device.create_pipeline_layout(&layout_info, None) {
        Ok(layout) => layout,
        Err(err) => {
            device.destroy_shader_module(vert_module, None);
            device.destroy_shader_module(frag_module, None);
            return Err(err).context("pipeline layout creation failed");
        }
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = device.create_graphics_pipelines(
        vk::PipelineCache::null(),
        &[pipeline_info],
        None,
    );

    device.destroy_shader_module(vert_module, None);
    device.destroy_shader_module(frag_module, None);

    match pipelines {
        Ok(pipelines) => Ok((layout, pipelines[0])),
        Err((_, err)) => {
            device.destroy_pipeline_layout(layout, None);
            Err(err).context("graphics pipeline creation failed")
        }
    }
}

/// # Safety
/// The device must be valid.
unsafe fn create_sampler(device: &ash::Device) -> anyhow::Result<vk::Sampler> {
    let info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(16.0)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK);

    device
        .create_sampler(&info, None)
        .context("sampler creation failed")
}

/// # Safety
/// All handles must be valid.
unsafe fn create_descriptors(
    device: &ash::Device,
    layout: vk::DescriptorSetLayout,
    uniform_buffer: &VulkanBuffer,
    texture_view: &VulkanImageView,
    sampler: vk::Sampler,
) -> anyhow::Result<(vk::DescriptorPool, vk::DescriptorSet)> {
    let pool_sizes = [
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1),
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1),
    ];

    let pool_info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(1)
        .pool_sizes(&pool_sizes);
    let pool = device
        .create_descriptor_pool(&pool_info, None)
        .context("descriptor pool creation failed")?;

    let set_layouts = [layout];
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(&set_layouts);
    let set = match device.allocate_descriptor_sets(&alloc_info) {
        Ok(sets) => sets[0],
        Err(err) => {
            device.destroy_descriptor_pool(pool, None);
            return Err(err).context("descriptor set allocation failed");
        }
    };

    let buffer_infos = [vk::DescriptorBufferInfo::default()
        .buffer(uniform_buffer.handle())
        .offset(0)
        .range(vk::WHOLE_SIZE)];

    let image_infos = [vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(texture_view.handle())
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];

    let writes = [
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_infos),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(1)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos),
    ];

    device.update_descriptor_sets(&writes, &[]);

    Ok((pool, set))
}

/// Procedural RGBA8 checkerboard.
fn checker_pixels() -> Vec<u8> {
    let mut pixels = Vec::with_capacity((TEXTURE_SIZE * TEXTURE_SIZE * 4) as usize);
    for y in 0..TEXTURE_SIZE {
        for x in 0..TEXTURE_SIZE {
            let on = ((x / CHECKER_CELL) + (y / CHECKER_CELL)) % 2 == 0;
            if on {
                pixels.extend_from_slice(&[235, 235, 235, 255]);
            } else {
                pixels.extend_from_slice(&[40, 40, 48, 255]);
            }
        }
    }
    pixels
}

/// Create the checkerboard texture and copy it up through a staging buffer
/// with a one-time command buffer.
fn upload_texture(
    device: &VulkanDevice,
    command_pool: vk::CommandPool,
) -> anyhow::Result<(VulkanImage, VulkanImageView)> {
    let pixels = checker_pixels();

    let mut staging = device.create_buffer(&BufferDesc {
        size: pixels.len() as u64,
        usage: BufferUsage::TRANSFER_SRC,
        cpu_access: CpuAccess::WRITE,
        gpu_access_rate: GpuAccessRate::Rare,
    })?;
    MappedBuffer::new(&mut staging)?.write(0, &pixels)?;

    let texture = device.create_image(&ImageDesc {
        dimensions: Extent3d::new(TEXTURE_SIZE, TEXTURE_SIZE, 1),
        layers: 1,
        format: ImageFormat::Rgba8Srgb,
        image_type: ImageType::D2,
        usage: ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
        cpu_access: CpuAccess::empty(),
        gpu_access_rate: GpuAccessRate::Frequent,
    })?;

    let queue = device
        .graphics_queue()
        .ok_or_else(|| anyhow!("no graphics queue"))?;
    let vk_device = device.device();

    unsafe {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = vk_device.allocate_command_buffers(&alloc_info)?[0];

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        vk_device.begin_command_buffer(cmd, &begin_info)?;

        let subresource = vk::ImageSubresourceRange::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1);

        let to_transfer = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.handle())
            .subresource_range(subresource);

        vk_device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_transfer],
        );

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_extent(vk::Extent3D {
                width: TEXTURE_SIZE,
                height: TEXTURE_SIZE,
                depth: 1,
            });

        vk_device.cmd_copy_buffer_to_image(
            cmd,
            staging.handle(),
            texture.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );

        let to_sampled = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.handle())
            .subresource_range(subresource);

        vk_device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_sampled],
        );

        vk_device.end_command_buffer(cmd)?;

        let command_buffers = [cmd];
        let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
        vk_device.queue_submit(queue, &[submit], vk::Fence::null())?;
        vk_device.queue_wait_idle(queue)?;

        vk_device.free_command_buffers(command_pool, &command_buffers);
    }

    let view_desc = ImageViewDesc::color_2d(&texture);
    let view = device.create_image_view(&view_desc)?;

    Ok((texture, view))
}
